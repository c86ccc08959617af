use std::{
    collections::HashMap,
    fs::{File, OpenOptions},
    path::Path,
};

use regex::Regex;

use crate::CommonResult;

// 内置的 tag 字典，tab 分隔
// tag 里的小写 x 是通配位，比如 60xx 的 overlay 组
const TAG_MAPPING: &str = include_str!("../tag_mapping.txt");

pub fn get_file(file_path: &Path) -> CommonResult<File> {
    let f = OpenOptions::new().read(true).open(file_path)?;

    Ok(f)
}

pub fn process_vec_to_vr(buffer: &[u8]) -> String {
    buffer.iter().map(|ele| *ele as char).collect()
}

// 线上会出现的全部 VR，不在这个表里的字节说明不是显式 VR 小端
pub fn known_vrs() -> &'static [&'static str] {
    &[
        "AE", "AS", "AT", "CS", "DA", "DS", "DT", "FL", "FD", "IS", "LO", "LT", "OB", "OD", "OF",
        "OL", "OV", "OW", "PN", "SH", "SL", "SQ", "SS", "ST", "SV", "TM", "UC", "UI", "UL", "UN",
        "UR", "US", "UT", "UV",
    ]
}

// 这些 VR 用带 2 字节保留位加 4 字节长度的头部结构
pub fn long_length_vrs() -> &'static [&'static str] {
    &[
        "OB", "OD", "OF", "OL", "OV", "OW", "SV", "UC", "UN", "UR", "UT", "UV",
    ]
}

pub fn load_and_convert_tag_mapping() -> (HashMap<String, String>, HashMap<String, String>) {
    let mut full_match_mapping = HashMap::new();
    let mut partial_match_mapping = HashMap::new();

    for line in TAG_MAPPING.lines() {
        let mut parts = line.splitn(2, '\t');

        let standard_tag = match parts.next() {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => continue,
        };
        let standard_explanation = match parts.next() {
            Some(v) => v.to_string(),
            None => continue,
        };

        if standard_tag.contains('x') {
            let standard_tag = standard_tag.replace('x', "\\w");
            partial_match_mapping.insert(standard_tag, standard_explanation);
        } else {
            full_match_mapping.insert(standard_tag, standard_explanation);
        }
    }

    (full_match_mapping, partial_match_mapping)
}

// 查不到一律退化成固定的 UNKNOWN TAG，字典失败永远不中断遍历
pub fn get_tag_description(tag: &str) -> String {
    if let Some(v) = crate::FULL_MATCH_MAPPING.get(tag) {
        return v.to_string();
    }

    for (standard_tag, standard_explanation) in &*crate::PARTIAL_MATCH_MAPPING {
        let regex = match Regex::new(&format!("^{}$", standard_tag)) {
            Ok(v) => v,
            Err(_) => continue,
        };

        if regex.is_match(tag) {
            return standard_explanation.to_string();
        }
    }

    "UNKNOWN TAG".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_tag_resolves_to_description() {
        assert_eq!(get_tag_description("0028,0010"), "Rows");
        assert_eq!(get_tag_description("0004,1430"), "Directory Record Type");
    }

    #[test]
    fn wildcard_tags_match_by_regex() {
        assert_eq!(get_tag_description("60AB,0010"), "Overlay Rows");
        assert_eq!(get_tag_description("6000,3000"), "Overlay Data");
    }

    #[test]
    fn unknown_tag_degrades_to_placeholder() {
        assert_eq!(get_tag_description("ABCD,EF01"), "UNKNOWN TAG");
    }

    #[test]
    fn vr_bytes_decode_as_ascii() {
        assert_eq!(process_vec_to_vr(&[0x43, 0x53]), "CS");
    }

    #[test]
    fn mapping_splits_full_and_partial() {
        let (full, partial) = load_and_convert_tag_mapping();

        assert!(full.contains_key("0010,0010"));
        assert!(partial.keys().any(|k| k.contains("\\w")));
    }
}
