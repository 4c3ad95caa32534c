//! カンマ区切りレコードの最小トークナイザ
//!
//! 必要な意味論は「ダブルクォート対応のカンマ分割」と「最初の `=` での
//! key/value 分割」だけなので、汎用 CSV クレートは使わない。
//! リスト入力の正規化、output の type 判定、provenance 属性の判定で共用する。

/// 1 行をクォート対応でカンマ分割し、trim して空フィールドを落とす
pub fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                // "" はエスケープされた引用符
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                push_field(&mut fields, &mut current);
            }
            _ => current.push(c),
        }
    }
    push_field(&mut fields, &mut current);
    fields
}

fn push_field(fields: &mut Vec<String>, current: &mut String) {
    let field = current.trim().to_string();
    current.clear();
    if !field.is_empty() {
        fields.push(field);
    }
}

/// フィールドを最初の `=` で key/value に分割 (`=` が無ければ value は None)
pub fn split_key_value(field: &str) -> (&str, Option<&str>) {
    match field.split_once('=') {
        Some((key, value)) => (key.trim(), Some(value.trim())),
        None => (field.trim(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_record_plain() {
        assert_eq!(split_record("a,b,c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_split_record_trims_and_drops_empty() {
        assert_eq!(split_record(" a , ,b,"), vec!["a", "b"]);
        assert!(split_record("").is_empty());
    }

    #[test]
    fn test_split_record_quoted_comma() {
        assert_eq!(
            split_record(r#"type=image,"name=repo:tag,repo:tag2""#),
            vec!["type=image", "name=repo:tag,repo:tag2"]
        );
    }

    #[test]
    fn test_split_record_escaped_quote() {
        assert_eq!(split_record(r#""say ""hi""",b"#), vec![r#"say "hi""#, "b"]);
    }

    #[test]
    fn test_split_key_value() {
        assert_eq!(split_key_value("type=local"), ("type", Some("local")));
        assert_eq!(
            split_key_value("builder-id=https://x/y?z=1"),
            ("builder-id", Some("https://x/y?z=1"))
        );
        assert_eq!(split_key_value("./out"), ("./out", None));
    }
}
