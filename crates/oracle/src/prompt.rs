// Prompt templates
//
// The column templates ask for one `表X的第N列 对应 表Y的第M列` line per
// correspondence, which is the grammar `rosterlink_merge::parser` reads.

use rosterlink_merge::model::MappingType;

pub const COLUMNS_SYSTEM: &str =
    "你是一个专门分析Excel表头并建立映射关系的助手。请直接返回映射关系，不要返回其他内容。";

pub const DATES_SYSTEM: &str =
    "你是一个专门处理日期格式的助手。请直接返回格式化后的日期，不要返回其他内容。";

/// `1. 学号` style numbered list, 1-based.
fn numbered(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{}. {}", i + 1, h))
        .collect::<Vec<_>>()
        .join("\n")
}

/// User prompt for one mapping type. `key_label` is the natural-key column
/// the model is told to pay particular attention to.
pub fn columns_prompt(left: &[String], right: &[String], mapping_type: MappingType, key_label: &str) -> String {
    let (left_label, right_label) = mapping_type.table_labels();
    format!(
        "请分析以下两个表格的表头，并建立它们之间的对应关系。\n\
这是{left_label}的表头：\n\
{left}\n\
\n\
这是{right_label}的表头：\n\
{right}\n\
\n\
请分析每个表头的含义，找出相同或相似的字段。对于每个找到的对应关系，请使用以下格式输出：\n\
{left_label}的第X列 对应 {right_label}的第Y列\n\
\n\
注意：\n\
1. 只输出确定的对应关系\n\
2. 每行只写一个对应关系\n\
3. 不需要解释原因\n\
4. 如果找不到对应关系，就不要输出\n\
5. 请特别注意\"{key_label}\"列的对应关系，这个是关键",
        left = numbered(left),
        right = numbered(right),
    )
}

/// User prompt asking for one `MM.DD` line per value, in order.
pub fn dates_prompt(values: &[String]) -> String {
    format!(
        "请将以下日期统一转换为mm.dd格式（月份和日期都用两位数表示，中间用点分隔）。\n\
如果日期明显错误或无法解析，请返回空字符串。\n\
示例：\n\
1月7日 -> 01.07\n\
1/7 -> 01.07\n\
2024/1/7 -> 01.07\n\
2024-01-07 -> 01.07\n\
\n\
需要转换的日期：\n\
{values}\n\
\n\
请按照以下格式返回结果，每行一个日期：\n\
01.07\n\
02.15\n\
...\n\
只返回转换后的日期，不要有任何解释性文字。对于空值或无法解析的日期，返回空行。",
        values = numbered(values),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_labels_follow_mapping_type() {
        let p = columns_prompt(&h(&["学号"]), &h(&["id"]), MappingType::SecondaryEnrichment, "学号");
        assert!(p.contains("这是表2的表头：\n1. 学号"));
        assert!(p.contains("这是表3的表头：\n1. id"));
        assert!(p.contains("表2的第X列 对应 表3的第Y列"));
    }

    #[test]
    fn test_headers_are_numbered_from_one() {
        let p = columns_prompt(
            &h(&["序号", "学号", "姓名"]),
            &h(&["姓名", "学号"]),
            MappingType::CanonicalSecondary,
            "学号",
        );
        assert!(p.contains("1. 序号\n2. 学号\n3. 姓名"));
        assert!(p.contains("表1的第X列 对应 表2的第Y列"));
        assert!(p.contains("请特别注意\"学号\"列"));
    }

    #[test]
    fn test_key_label_is_configurable() {
        let p = columns_prompt(&h(&["a"]), &h(&["b"]), MappingType::CanonicalEnrichment, "Student ID");
        assert!(p.contains("\"Student ID\""));
    }

    #[test]
    fn test_dates_prompt_lists_values() {
        let p = dates_prompt(&h(&["三月一号", "1月18号"]));
        assert!(p.contains("需要转换的日期：\n1. 三月一号\n2. 1月18号\n"));
    }
}
