//! 上传文件名清洗：只保留可安全落盘的 ASCII 字符。

/// 将文件名规整为扁平、安全的 ASCII 文件名。
///
/// 路径分隔符视为分词，连续空白替换为 `_`，`[A-Za-z0-9_.-]` 以外的字符被丢弃，
/// 首尾的 `.`/`_` 会被去掉，结果不会指向上级目录或隐藏文件。
pub fn secure_filename(name: &str) -> String {
    let flattened: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = flattened.split_whitespace().collect::<Vec<_>>().join("_");
    joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::secure_filename;

    #[test]
    fn keeps_map_names_unchanged() {
        assert_eq!(secure_filename("map_1500.dat"), "map_1500.dat");
    }

    #[test]
    fn strips_path_components() {
        assert_eq!(secure_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(secure_filename("..\\idcounts.dat"), "idcounts.dat");
        assert_eq!(secure_filename("/map_1.dat"), "map_1.dat");
    }

    #[test]
    fn collapses_whitespace_and_drops_unsafe_chars() {
        assert_eq!(secure_filename("my  map\t1.dat"), "my_map_1.dat");
        assert_eq!(secure_filename("carte-é$1.dat"), "carte-1.dat");
        assert_eq!(secure_filename("..."), "");
    }
}
