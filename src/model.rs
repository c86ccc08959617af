use crate::CommonResult;

#[derive(Debug, Clone)]
pub enum DicomValue {
    // 字符串类的 VR 在解析时已经按照 \ 分隔成多个值
    Str(Vec<String>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    Bytes(Vec<u8>),
    Sequence(Vec<SequenceItem>),
}

// SQ 里的一个 item
// offset 是 item tag 在文件中的绝对偏移
// DICOMDIR 的目录记录之间就是用这个偏移相互引用的
#[derive(Debug, Clone)]
pub struct SequenceItem {
    pub offset: usize,
    pub elements: Vec<DataElement>,
}

// 一个 tag 可以有多个 buffer，每个 buffer 里是一组有序的值
// 解析器只会产生单 buffer 的 tag，多 buffer 的结构留给格式化逻辑统一处理
#[derive(Debug, Clone)]
pub struct DataElement {
    pub group: u16,
    pub element: u16,
    pub vr: String,
    pub buffers: Vec<DicomValue>,
}

impl DataElement {
    // 字典查询用的 key，比如 "0028,0010"
    pub fn tag_key(&self) -> String {
        format!("{:04X},{:04X}", self.group, self.element)
    }
}

// 一个文件或者一条目录记录对应的全部数据元素
// 顺序就是文件里的顺序
#[derive(Debug, Clone)]
pub struct DataSet {
    pub elements: Vec<DataElement>,
}

impl DataSet {
    pub fn get(&self, group: u16, element: u16) -> Option<&DataElement> {
        self.elements
            .iter()
            .find(|e| e.group == group && e.element == element)
    }

    fn first_buffer(&self, group: u16, element: u16) -> Option<&DicomValue> {
        self.get(group, element).and_then(|e| e.buffers.first())
    }

    pub fn get_u16(&self, group: u16, element: u16, default: u16) -> u16 {
        match self.first_buffer(group, element) {
            Some(DicomValue::U16(v)) if !v.is_empty() => v[0],
            Some(DicomValue::Str(v)) if !v.is_empty() => v[0].trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    // IS 这种数字字符串也要能转出来
    pub fn get_u32(&self, group: u16, element: u16, default: u32) -> u32 {
        match self.first_buffer(group, element) {
            Some(DicomValue::U32(v)) if !v.is_empty() => v[0],
            Some(DicomValue::U16(v)) if !v.is_empty() => v[0] as u32,
            Some(DicomValue::Str(v)) if !v.is_empty() => v[0].trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    // DS 是十进制字符串，rescale slope/intercept 都是这个类型
    pub fn get_f64(&self, group: u16, element: u16, default: f64) -> f64 {
        match self.first_buffer(group, element) {
            Some(DicomValue::F64(v)) if !v.is_empty() => v[0],
            Some(DicomValue::Str(v)) if !v.is_empty() => v[0].trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    pub fn get_str(&self, group: u16, element: u16, default: &str) -> String {
        match self.first_buffer(group, element) {
            Some(DicomValue::Str(v)) if !v.is_empty() => v[0].clone(),
            _ => default.to_string(),
        }
    }

    pub fn frame_count(&self) -> u32 {
        self.get_u32(0x0028, 0x0008, 1)
    }

    // 取出一帧像素并应用 modality transform
    // 帧相关的失败（越界、缺少像素数据）是可恢复的，调用方逐帧兜底
    pub fn get_frame(&self, index: u32) -> CommonResult<Frame> {
        let width = self.get_u16(0x0028, 0x0011, 0) as usize;
        let height = self.get_u16(0x0028, 0x0010, 0) as usize;

        if width == 0 || height == 0 {
            return Err("missing Rows/Columns".into());
        }

        let channels = self.get_u16(0x0028, 0x0002, 1) as usize;
        let bits_allocated = self.get_u16(0x0028, 0x0100, 0);
        let pixel_representation = self.get_u16(0x0028, 0x0103, 0);
        let depth = BitDepth::from_tags(bits_allocated, pixel_representation);
        let high_bit = self.get_u16(0x0028, 0x0102, bits_allocated.saturating_sub(1)) as u32;
        let color_space = self.get_str(0x0028, 0x0004, "MONOCHROME2");

        let data = match self.first_buffer(0x7FE0, 0x0010) {
            Some(DicomValue::Bytes(v)) => v,
            _ => return Err("no pixel data".into()),
        };

        let frame_size = width * height * channels * depth.unit_size();
        let start = index as usize * frame_size;
        let end = start + frame_size;

        if end > data.len() {
            return Err(format!(
                "frame {} out of range: pixel data holds {} bytes, frame needs bytes {}..{}",
                index,
                data.len(),
                start,
                end
            )
            .into());
        }

        let raw = &data[start..end];

        let slope = self.get_f64(0x0028, 0x1053, 1.0);
        let intercept = self.get_f64(0x0028, 0x1052, 0.0);

        if slope == 1.0 && intercept == 0.0 {
            return Ok(Frame {
                width,
                height,
                channels,
                depth,
                high_bit,
                color_space,
                data: raw.to_vec(),
            });
        }

        // 变换之后的值域不再受原始位深约束，统一放宽到 S32
        let mut transformed = Vec::with_capacity(width * height * channels * 4);

        for sample in decode_samples(raw, depth) {
            let v = (sample as f64 * slope + intercept).round() as i32;
            transformed.extend_from_slice(&v.to_le_bytes());
        }

        Ok(Frame {
            width,
            height,
            channels,
            depth: BitDepth::S32,
            high_bit,
            color_space,
            data: transformed,
        })
    }
}

// 支持的位深是封闭的六种组合，其他组合直接按非法输入处理
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDepth {
    U8,
    S8,
    U16,
    S16,
    U32,
    S32,
}

impl BitDepth {
    pub fn from_tags(bits_allocated: u16, pixel_representation: u16) -> BitDepth {
        match (bits_allocated, pixel_representation) {
            (8, 0) => BitDepth::U8,
            (8, 1) => BitDepth::S8,
            (16, 0) => BitDepth::U16,
            (16, 1) => BitDepth::S16,
            (32, 0) => BitDepth::U32,
            (32, 1) => BitDepth::S32,
            _ => panic!(
                "unsupported bit depth: bits_allocated={} pixel_representation={}",
                bits_allocated, pixel_representation
            ),
        }
    }

    pub fn unit_size(&self) -> usize {
        match self {
            BitDepth::U8 | BitDepth::S8 => 1,
            BitDepth::U16 | BitDepth::S16 => 2,
            BitDepth::U32 | BitDepth::S32 => 4,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, BitDepth::S8 | BitDepth::S16 | BitDepth::S32)
    }

    pub fn name(&self) -> &'static str {
        match self {
            BitDepth::U8 => "depthU8",
            BitDepth::S8 => "depthS8",
            BitDepth::U16 => "depthU16",
            BitDepth::S16 => "depthS16",
            BitDepth::U32 => "depthU32",
            BitDepth::S32 => "depthS32",
        }
    }
}

// 一帧解码后的像素，行优先的小端原始字节
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub depth: BitDepth,
    pub high_bit: u32,
    pub color_space: String,
    pub data: Vec<u8>,
}

// 六种采样类型共用一套读取/拓宽逻辑
// 具体类型只在读到位深的地方选一次，后面的算法都是泛型的
pub(crate) trait Sample: Copy {
    const BYTES: usize;
    fn read_le(bytes: &[u8]) -> Self;
    fn widen(self) -> i64;
}

impl Sample for u8 {
    const BYTES: usize = 1;
    fn read_le(bytes: &[u8]) -> u8 {
        bytes[0]
    }
    fn widen(self) -> i64 {
        self as i64
    }
}

impl Sample for i8 {
    const BYTES: usize = 1;
    fn read_le(bytes: &[u8]) -> i8 {
        i8::from_le_bytes([bytes[0]])
    }
    fn widen(self) -> i64 {
        self as i64
    }
}

impl Sample for u16 {
    const BYTES: usize = 2;
    fn read_le(bytes: &[u8]) -> u16 {
        u16::from_le_bytes([bytes[0], bytes[1]])
    }
    fn widen(self) -> i64 {
        self as i64
    }
}

impl Sample for i16 {
    const BYTES: usize = 2;
    fn read_le(bytes: &[u8]) -> i16 {
        i16::from_le_bytes([bytes[0], bytes[1]])
    }
    fn widen(self) -> i64 {
        self as i64
    }
}

impl Sample for u32 {
    const BYTES: usize = 4;
    fn read_le(bytes: &[u8]) -> u32 {
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
    fn widen(self) -> i64 {
        self as i64
    }
}

impl Sample for i32 {
    const BYTES: usize = 4;
    fn read_le(bytes: &[u8]) -> i32 {
        i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
    fn widen(self) -> i64 {
        self as i64
    }
}

fn decode_all<T: Sample>(data: &[u8]) -> Vec<i64> {
    data.chunks_exact(T::BYTES)
        .map(|chunk| T::read_le(chunk).widen())
        .collect()
}

pub(crate) fn decode_samples(data: &[u8], depth: BitDepth) -> Vec<i64> {
    match depth {
        BitDepth::U8 => decode_all::<u8>(data),
        BitDepth::S8 => decode_all::<i8>(data),
        BitDepth::U16 => decode_all::<u16>(data),
        BitDepth::S16 => decode_all::<i16>(data),
        BitDepth::U32 => decode_all::<u32>(data),
        BitDepth::S32 => decode_all::<i32>(data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_data_set(width: u16, height: u16, frames: &str, pixels: Vec<u8>) -> DataSet {
        DataSet {
            elements: vec![
                DataElement {
                    group: 0x0028,
                    element: 0x0010,
                    vr: "US".to_string(),
                    buffers: vec![DicomValue::U16(vec![height])],
                },
                DataElement {
                    group: 0x0028,
                    element: 0x0011,
                    vr: "US".to_string(),
                    buffers: vec![DicomValue::U16(vec![width])],
                },
                DataElement {
                    group: 0x0028,
                    element: 0x0008,
                    vr: "IS".to_string(),
                    buffers: vec![DicomValue::Str(vec![frames.to_string()])],
                },
                DataElement {
                    group: 0x0028,
                    element: 0x0100,
                    vr: "US".to_string(),
                    buffers: vec![DicomValue::U16(vec![8])],
                },
                DataElement {
                    group: 0x7FE0,
                    element: 0x0010,
                    vr: "OW".to_string(),
                    buffers: vec![DicomValue::Bytes(pixels)],
                },
            ],
        }
    }

    #[test]
    fn frame_count_parses_integer_string() {
        let ds = image_data_set(2, 2, "5", vec![0; 8]);
        assert_eq!(ds.frame_count(), 5);
    }

    #[test]
    fn frame_count_defaults_to_one() {
        let ds = DataSet { elements: vec![] };
        assert_eq!(ds.frame_count(), 1);
    }

    #[test]
    fn get_frame_slices_by_index() {
        let ds = image_data_set(2, 2, "2", vec![1, 2, 3, 4, 5, 6, 7, 8]);

        let f0 = ds.get_frame(0).unwrap();
        let f1 = ds.get_frame(1).unwrap();

        assert_eq!(f0.data, vec![1, 2, 3, 4]);
        assert_eq!(f1.data, vec![5, 6, 7, 8]);
        assert_eq!(f0.depth, BitDepth::U8);
        assert_eq!(f0.color_space, "MONOCHROME2");
    }

    #[test]
    fn get_frame_out_of_range_is_recoverable() {
        let ds = image_data_set(2, 2, "2", vec![0; 4]);

        assert!(ds.get_frame(0).is_ok());
        assert!(ds.get_frame(1).is_err());
    }

    #[test]
    fn modality_transform_widens_to_s32() {
        let mut ds = image_data_set(2, 1, "1", vec![1, 2]);
        ds.elements.push(DataElement {
            group: 0x0028,
            element: 0x1053,
            vr: "DS".to_string(),
            buffers: vec![DicomValue::Str(vec!["2".to_string()])],
        });
        ds.elements.push(DataElement {
            group: 0x0028,
            element: 0x1052,
            vr: "DS".to_string(),
            buffers: vec![DicomValue::Str(vec!["-3".to_string()])],
        });

        let frame = ds.get_frame(0).unwrap();

        assert_eq!(frame.depth, BitDepth::S32);
        assert_eq!(decode_samples(&frame.data, frame.depth), vec![-1, 1]);
    }

    #[test]
    #[should_panic(expected = "unsupported bit depth")]
    fn bad_depth_combination_panics() {
        BitDepth::from_tags(12, 0);
    }

    #[test]
    fn depth_metadata_is_consistent() {
        assert!(BitDepth::S16.is_signed());
        assert!(!BitDepth::U32.is_signed());
        assert_eq!(BitDepth::U32.unit_size(), 4);
        assert_eq!(BitDepth::S8.name(), "depthS8");
    }

    #[test]
    fn decode_samples_honors_signedness() {
        assert_eq!(decode_samples(&[0xFF, 0xFF], BitDepth::S16), vec![-1]);
        assert_eq!(decode_samples(&[0xFF, 0xFF], BitDepth::U16), vec![65535]);
    }
}
