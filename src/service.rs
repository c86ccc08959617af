use std::io::Read;
use std::path::Path;

use image::{ImageBuffer, Luma};

use crate::model::{decode_samples, DataElement, DataSet, DicomValue, Frame, SequenceItem};
use crate::{util, CommonResult};

// FFFE,E000 / FFFE,E0DD / FFFE,E00D 的小端字节
// 定界 tag 后面跟的 4 字节长度固定是 0
const ITEM_TAG: [u8; 4] = [0xFE, 0xFF, 0x00, 0xE0];
const SEQ_DELIMITER: [u8; 8] = [0xFE, 0xFF, 0xDD, 0xE0, 0x00, 0x00, 0x00, 0x00];
const ITEM_DELIMITER: [u8; 8] = [0xFE, 0xFF, 0x0D, 0xE0, 0x00, 0x00, 0x00, 0x00];

// 整个文件一次读进来，解析成有序的数据元素列表
// 这里只支持显式 VR 小端，DICOMDIR 和它引用的未压缩文件都是这个格式
pub fn load(path: &Path) -> CommonResult<DataSet> {
    let mut file = util::get_file(path)?;

    let mut content = Vec::new();
    file.read_to_end(&mut content)?;

    let mut offset = 0;

    offset += get_preamble(&content)?;

    let (prefix, consumed) = get_prefix(&content[offset..])?;
    offset += consumed;

    if prefix != "DICM" {
        return Err(format!("{:?} is not a DICOM file (bad prefix {:?})", path, prefix).into());
    }

    let mut elements = Vec::new();

    while offset < content.len() {
        let (element, consumed) = get_data_element(&content[offset..], offset)?;

        offset += consumed;
        elements.push(element);
    }

    Ok(DataSet { elements })
}

fn get_preamble(buffer: &[u8]) -> CommonResult<usize> {
    let length = 128;

    if buffer.len() < length {
        return Err("file shorter than the 128 byte preamble".into());
    }

    Ok(length)
}

fn get_prefix(buffer: &[u8]) -> CommonResult<(String, usize)> {
    let length = 4;

    if buffer.len() < length {
        return Err("file truncated in the DICM prefix".into());
    }

    Ok((String::from_utf8_lossy(&buffer[..length]).to_string(), length))
}

// 解析一个数据元素，base 是 buffer[0] 在文件里的绝对偏移
// SQ 的 item 偏移要靠它算出来
pub fn get_data_element(buffer: &[u8], base: usize) -> CommonResult<(DataElement, usize)> {
    if buffer.len() < 8 {
        return Err(format!("truncated element header at offset {}", base).into());
    }

    let group = u16::from_le_bytes([buffer[0], buffer[1]]);
    let element = u16::from_le_bytes([buffer[2], buffer[3]]);
    let vr = util::process_vec_to_vr(&buffer[4..6]);

    let mut length = 6;

    if !util::known_vrs().contains(&vr.as_str()) {
        return Err(format!(
            "unknown VR {:?} for tag {:04X},{:04X} at offset {} (implicit little endian is not supported)",
            vr, group, element, base
        )
        .into());
    }

    if vr == "SQ" {
        // 带保留字节的特殊结构，长度字段归 parse_sq_data 处理
        length += 2;

        let (value, consumed) = parse_sq_data(&buffer[length..], base + length)?;

        return Ok((
            DataElement {
                group,
                element,
                vr,
                buffers: vec![value],
            },
            length + consumed,
        ));
    }

    let data_length = if util::long_length_vrs().contains(&vr.as_str()) {
        // 带保留字节的特殊结构，长度是 4 字节
        length += 2;

        if buffer.len() < length + 4 {
            return Err(format!("truncated element length at offset {}", base).into());
        }

        let value = u32::from_le_bytes([
            buffer[length],
            buffer[length + 1],
            buffer[length + 2],
            buffer[length + 3],
        ]);

        length += 4;

        if value == 0xFFFF_FFFF {
            return Err(format!(
                "tag {:04X},{:04X} has undefined length (encapsulated pixel data is not supported)",
                group, element
            )
            .into());
        }

        value as usize
    } else {
        // 普通结构，长度是 2 字节
        let value = u16::from_le_bytes([buffer[length], buffer[length + 1]]) as usize;

        length += 2;

        value
    };

    if buffer.len() < length + data_length {
        return Err(format!(
            "element {:04X},{:04X} at offset {} claims {} data bytes, only {} remain",
            group,
            element,
            base,
            data_length,
            buffer.len() - length
        )
        .into());
    }

    let value = parse_data(&buffer[length..length + data_length], &vr, group, element);

    length += data_length;

    Ok((
        DataElement {
            group,
            element,
            vr,
            buffers: vec![value],
        },
        length,
    ))
}

fn parse_data(buffer: &[u8], vr: &str, group: u16, element: u16) -> DicomValue {
    match vr {
        "UL" => DicomValue::U32(
            buffer
                .chunks_exact(4)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
        "SL" => DicomValue::I32(
            buffer
                .chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
        // AT 是 (group, element) 对，先按 u16 存着，格式化那边还没接上
        "US" | "AT" => DicomValue::U16(
            buffer
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect(),
        ),
        "SS" => DicomValue::I16(
            buffer
                .chunks_exact(2)
                .map(|c| i16::from_le_bytes([c[0], c[1]]))
                .collect(),
        ),
        "FL" => DicomValue::F32(
            buffer
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
        "FD" => DicomValue::F64(
            buffer
                .chunks_exact(8)
                .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect(),
        ),
        // 像素数据保留原始字节，交给帧解码处理
        "OB" if (group, element) == (0x7FE0, 0x0010) => DicomValue::Bytes(buffer.to_vec()),
        "AE" | "AS" | "CS" | "DA" | "DS" | "DT" | "IS" | "LO" | "LT" | "OB" | "PN" | "SH"
        | "ST" | "TM" | "UC" | "UI" | "UR" | "UT" => DicomValue::Str(decode_text(buffer)),
        _ => DicomValue::Bytes(buffer.to_vec()),
    }
}

// 默认字符集按 ISO_IR 100 处理，多值用 \ 分隔
// 尾部的空格和 NUL 都是填充
fn decode_text(buffer: &[u8]) -> Vec<String> {
    if buffer.is_empty() {
        return Vec::new();
    }

    let (text, _, _) = encoding_rs::WINDOWS_1252.decode(buffer);

    text.split('\\')
        .map(|v| v.trim_end_matches('\0').trim().to_string())
        .collect()
}

fn parse_sq_data(buffer: &[u8], base: usize) -> CommonResult<(DicomValue, usize)> {
    if buffer.len() < 4 {
        return Err(format!("truncated sequence length at offset {}", base).into());
    }

    let data_element_length =
        u32::from_le_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;

    let mut offset = 4;
    let content_base = base + offset;

    let content = if data_element_length == 0xFFFF_FFFF {
        // 未定义长度，往后找序列定界 tag
        match buffer[offset..]
            .windows(SEQ_DELIMITER.len())
            .position(|window| window == SEQ_DELIMITER)
        {
            Some(index) => {
                let content = &buffer[offset..offset + index];

                offset += index + SEQ_DELIMITER.len();
                content
            }
            None => return Err("Seq. Delim. Tag not found".into()),
        }
    } else {
        if buffer.len() < offset + data_element_length {
            return Err(format!("truncated sequence content at offset {}", base).into());
        }

        let content = &buffer[offset..offset + data_element_length];

        offset += data_element_length;
        content
    };

    let items = parse_sq_items(content, content_base)?;

    Ok((DicomValue::Sequence(items), offset))
}

fn parse_sq_items(buffer: &[u8], base: usize) -> CommonResult<Vec<SequenceItem>> {
    let mut offset = 0;
    let mut items = Vec::new();

    while offset < buffer.len() {
        // item 的绝对偏移就是 DICOMDIR 目录记录相互引用的值
        let item_offset = base + offset;

        if buffer.len() < offset + 8 {
            return Err(format!("truncated item header at offset {}", item_offset).into());
        }

        if buffer[offset..offset + 4] != ITEM_TAG {
            return Err(format!("item tag is invalid at offset {}", item_offset).into());
        }

        offset += 4;

        let item_length = u32::from_le_bytes([
            buffer[offset],
            buffer[offset + 1],
            buffer[offset + 2],
            buffer[offset + 3],
        ]) as usize;

        offset += 4;

        let content_base = base + offset;

        let content = if item_length == 0xFFFF_FFFF {
            // 未定义长度，往后找 item 定界 tag
            match buffer[offset..]
                .windows(ITEM_DELIMITER.len())
                .position(|window| window == ITEM_DELIMITER)
            {
                Some(index) => {
                    let content = &buffer[offset..offset + index];

                    offset += index + ITEM_DELIMITER.len();
                    content
                }
                None => return Err("Item Delim. Tag not found".into()),
            }
        } else {
            if buffer.len() < offset + item_length {
                return Err(format!("truncated item content at offset {}", item_offset).into());
            }

            let content = &buffer[offset..offset + item_length];

            offset += item_length;
            content
        };

        // 一个 item 里可以有多个元素
        let mut elements = Vec::new();
        let mut item_pos = 0;

        while item_pos < content.len() {
            let (element, consumed) =
                get_data_element(&content[item_pos..], content_base + item_pos)?;

            elements.push(element);
            item_pos += consumed;
        }

        items.push(SequenceItem {
            offset: item_offset,
            elements,
        });
    }

    Ok(items)
}

// 把一帧按最小/最大值归一化成灰度 PNG 存下来
pub fn export_frame_png(frame: &Frame, path: &Path) -> CommonResult<()> {
    let samples = decode_samples(&frame.data, frame.depth);
    let count = frame.width * frame.height;

    if samples.len() < count {
        return Err("frame holds fewer samples than width x height".into());
    }

    let samples = &samples[..count];

    let min = *samples.iter().min().ok_or("empty frame")?;
    let max = *samples.iter().max().ok_or("empty frame")?;
    let range = (max - min).max(1);

    let mut img = ImageBuffer::<Luma<u8>, Vec<u8>>::new(frame.width as u32, frame.height as u32);

    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let index = y as usize * frame.width + x as usize;
        let value = ((samples[index] - min) * 255 / range) as u8;

        *pixel = Luma([value]);
    }

    img.save(path)?;

    Ok(())
}
