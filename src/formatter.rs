use std::fmt::{Display, Write};

use crate::model::{DataElement, DicomValue};

// 两级渲染共用的规则：
// 长度为 1 的序列不加括号，渲染满 10 个元素之后用 ... 截断
fn maybe_format_seq<T>(
    s: &mut String,
    seq: &[T],
    open: &str,
    close: &str,
    delim: &str,
    fmt: impl Fn(&mut String, &T),
) {
    if seq.len() != 1 {
        s.push_str(open);
    }

    for (index, item) in seq.iter().enumerate() {
        if index != 0 {
            s.push_str(delim);
        }

        if index == 10 {
            s.push_str("...");
            break;
        }

        fmt(s, item);
    }

    if seq.len() != 1 {
        s.push_str(close);
    }
}

// 把 tag 的每个 buffer 映射成对应类型的切片
// buffer 类型和 VR 对不上属于非法输入，直接 panic
fn tag_values<'a, T>(
    tag: &'a DataElement,
    get: impl Fn(&'a DicomValue) -> &'a [T],
) -> Vec<&'a [T]> {
    tag.buffers.iter().map(get).collect()
}

fn str_values(buffer: &DicomValue) -> &[String] {
    match buffer {
        DicomValue::Str(v) => v,
        other => panic!("expected string buffer, got {:?}", other),
    }
}

fn i16_values(buffer: &DicomValue) -> &[i16] {
    match buffer {
        DicomValue::I16(v) => v,
        other => panic!("expected i16 buffer, got {:?}", other),
    }
}

fn i32_values(buffer: &DicomValue) -> &[i32] {
    match buffer {
        DicomValue::I32(v) => v,
        other => panic!("expected i32 buffer, got {:?}", other),
    }
}

fn u16_values(buffer: &DicomValue) -> &[u16] {
    match buffer {
        DicomValue::U16(v) => v,
        other => panic!("expected u16 buffer, got {:?}", other),
    }
}

fn u32_values(buffer: &DicomValue) -> &[u32] {
    match buffer {
        DicomValue::U32(v) => v,
        other => panic!("expected u32 buffer, got {:?}", other),
    }
}

fn f32_values(buffer: &DicomValue) -> &[f32] {
    match buffer {
        DicomValue::F32(v) => v,
        other => panic!("expected f32 buffer, got {:?}", other),
    }
}

fn f64_values(buffer: &DicomValue) -> &[f64] {
    match buffer {
        DicomValue::F64(v) => v,
        other => panic!("expected f64 buffer, got {:?}", other),
    }
}

// 外层是 buffer 的序列（[]），内层是单个 buffer 里的值（{}）
// 两层各自独立套用单元素省略和截断规则
fn format_tag_values<T: Display>(vr_name: &str, values: &[&[T]]) -> String {
    let mut s = format!("{}: ", vr_name);

    maybe_format_seq(&mut s, values, "[", "]", ", ", |s, buffer| {
        maybe_format_seq(s, buffer, "{", "}", ", ", |s, value| {
            let _ = write!(s, "{}", value);
        })
    });

    s
}

// PN 只取第一个 buffer 第一个值的字母表示（第一个 = 之前的部分）
fn alphabetic_representation(tag: &DataElement) -> String {
    match tag.buffers.first() {
        Some(DicomValue::Str(v)) if !v.is_empty() => {
            v[0].split('=').next().unwrap_or("").to_string()
        }
        _ => String::new(),
    }
}

pub fn tag_to_string(tag: &DataElement) -> String {
    match tag.vr.as_str() {
        "AE" => format_tag_values("AE", &tag_values(tag, str_values)),
        "AS" => format_tag_values("AS", &tag_values(tag, str_values)),
        "CS" => format_tag_values("CS", &tag_values(tag, str_values)),
        "DA" => format_tag_values("DA", &tag_values(tag, str_values)),
        "DS" => format_tag_values("DS", &tag_values(tag, str_values)),
        "DT" => format_tag_values("DT", &tag_values(tag, str_values)),
        "FL" => format_tag_values("FL", &tag_values(tag, f32_values)),
        "FD" => format_tag_values("FD", &tag_values(tag, f64_values)),
        "IS" => format_tag_values("IS", &tag_values(tag, str_values)),
        "LO" => format_tag_values("LO", &tag_values(tag, str_values)),
        "LT" => format_tag_values("LT", &tag_values(tag, str_values)),
        // 像素数据那种保留原始字节的 OB 没有可读的字符串
        "OB" => match tag.buffers.first() {
            Some(DicomValue::Bytes(_)) => "TODO: OB".to_string(),
            _ => format_tag_values("OB", &tag_values(tag, str_values)),
        },
        "PN" => format!("PN: {}", alphabetic_representation(tag)),
        "SH" => format_tag_values("SH", &tag_values(tag, str_values)),
        "SL" => format_tag_values("SL", &tag_values(tag, i32_values)),
        // SQ 没有可读的字符串 buffer，渲染成空的外层序列
        "SQ" => format_tag_values::<String>("SQ", &[]),
        "SS" => format_tag_values("SS", &tag_values(tag, i16_values)),
        "TM" => format_tag_values("TM", &tag_values(tag, str_values)),
        "UI" => format_tag_values("UI", &tag_values(tag, str_values)),
        "UL" => format_tag_values("UL", &tag_values(tag, u32_values)),
        "US" => format_tag_values("US", &tag_values(tag, u16_values)),
        // 合法但还没接上类型化读取的 VR，降级成占位符，不中断遍历
        "AT" | "SB" | "OD" | "OF" | "OL" | "OV" | "OW" | "ST" | "SV" | "UC" | "UN" | "UR"
        | "UT" | "UV" => format!("TODO: {}", tag.vr),
        other => panic!("Unexpected tag type: {}", other),
    }
}

// 把所有 buffer 里的字符串按顺序摊平，引用文件路径的各段就是这么存的
pub fn flatten_str(tag: &DataElement) -> Vec<String> {
    let mut result = Vec::new();

    for buffer in &tag.buffers {
        for value in str_values(buffer) {
            result.push(value.clone());
        }
    }

    result
}
