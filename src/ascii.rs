use crate::model::{BitDepth, Frame, Sample};

// 亮度从暗到亮排列的字符表
const BRIGHTNESS_TABLE: &[u8] =
    b" `.-':_,^=;><+!rc*/z?sLTv)J7(|Fi{C}fI31tlu[neoZ5Yxjya]2ESwqkP6h9d4\
VpOGbUAKXHm8RD#$Bg0MNWQ%&@";

#[derive(Debug, Clone, Copy, Default)]
struct Cell {
    acc: i64,
    count: i64,
}

// 面积平均缩小后的字符画
// 每个 cell 输出两个相同的字符，抵消终端里字符高比宽大的问题
pub struct AsciiImage {
    image: String,
    width: usize,
    height: usize,
}

impl AsciiImage {
    pub fn new(max_width: usize, max_height: usize, frame: &Frame) -> AsciiImage {
        let width = frame.width;
        let height = frame.height;

        // 保持宽高比，选出装得进限制框又不超过原始分辨率的最大输出尺寸
        let (out_width, out_height) = if width * max_height <= max_width * height {
            if height <= max_height {
                (width, height)
            } else {
                (width * max_height / height, max_height)
            }
        } else if width <= max_width {
            (width, height)
        } else {
            (max_width, height * max_width / width)
        };

        let expected = width * height * frame.channels * frame.depth.unit_size();
        assert_eq!(
            frame.data.len(),
            expected,
            "pixel buffer size mismatch: {} bytes for {}x{}x{} at {}",
            frame.data.len(),
            width,
            height,
            frame.channels,
            frame.depth.name()
        );

        if out_width == 0 || out_height == 0 {
            return AsciiImage {
                image: String::new(),
                width: 0,
                height: 0,
            };
        }

        let mut cells = vec![Cell::default(); out_width * out_height];

        // 多通道图像也只取前 width*height 个采样，当成单通道处理
        // 这是从上游保留下来的已知限制
        match frame.depth {
            BitDepth::U8 => accumulate::<u8>(&frame.data, width, height, out_width, out_height, &mut cells),
            BitDepth::S8 => accumulate::<i8>(&frame.data, width, height, out_width, out_height, &mut cells),
            BitDepth::U16 => accumulate::<u16>(&frame.data, width, height, out_width, out_height, &mut cells),
            BitDepth::S16 => accumulate::<i16>(&frame.data, width, height, out_width, out_height, &mut cells),
            BitDepth::U32 => accumulate::<u32>(&frame.data, width, height, out_width, out_height, &mut cells),
            BitDepth::S32 => accumulate::<i32>(&frame.data, width, height, out_width, out_height, &mut cells),
        }

        for cell in cells.iter_mut() {
            cell.acc /= cell.count;
        }

        let mut min = cells[0].acc;
        let mut max = min;

        for cell in &cells {
            min = min.min(cell.acc);
            max = max.max(cell.acc);
        }

        // 全图同一个亮度时把区间撑开到 1，避免除零
        if max == min {
            max += 1;
        }

        let ramp_len = BRIGHTNESS_TABLE.len() as i64;
        let mut image = String::with_capacity(2 * out_width * out_height);

        for cell in &cells {
            let index = (cell.acc - min) * (ramp_len - 1) / (max - min);
            let ch = BRIGHTNESS_TABLE[index as usize] as char;

            image.push(ch);
            image.push(ch);
        }

        AsciiImage {
            image,
            width: out_width,
            height: out_height,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn rows(&self) -> Vec<&str> {
        let stride = 2 * self.width;
        let mut result = Vec::with_capacity(self.height);

        for row in 0..self.height {
            let start = row * stride;
            result.push(&self.image[start..start + stride]);
        }

        result
    }
}

// 一次遍历所有源像素，目标 cell 坐标是整数向下取整
// 缩小时多个源像素会落进同一个 cell
fn accumulate<T: Sample>(
    data: &[u8],
    width: usize,
    height: usize,
    out_width: usize,
    out_height: usize,
    cells: &mut [Cell],
) {
    let mut offset = 0;

    for y in 0..height {
        let yy = y * out_height / height;
        let row = yy * out_width;

        for x in 0..width {
            let xx = x * out_width / width;
            let cell = &mut cells[row + xx];

            cell.acc += T::read_le(&data[offset..]).widen();
            cell.count += 1;

            offset += T::BYTES;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: usize, height: usize, depth: BitDepth, data: Vec<u8>) -> Frame {
        Frame {
            width,
            height,
            channels: 1,
            depth,
            high_bit: depth.unit_size() as u32 * 8 - 1,
            color_space: "MONOCHROME2".to_string(),
            data,
        }
    }

    #[test]
    fn two_cells_map_to_ramp_extremes() {
        // 2x4 的图装进 2x2 的框会缩成 1x2，两个 cell 的均值分别是 0 和 10
        let f = frame(2, 4, BitDepth::U8, vec![0, 0, 0, 0, 10, 10, 10, 10]);
        let img = AsciiImage::new(2, 2, &f);

        assert_eq!(img.width(), 1);
        assert_eq!(img.height(), 2);
        assert_eq!(img.rows(), vec!["  ", "@@"]);
    }

    #[test]
    fn quantization_is_shift_invariant() {
        let base = frame(2, 4, BitDepth::U8, vec![0, 0, 0, 0, 10, 10, 10, 10]);
        let shifted = frame(2, 4, BitDepth::U8, vec![100, 100, 100, 100, 110, 110, 110, 110]);

        assert_eq!(
            AsciiImage::new(2, 2, &base).rows(),
            AsciiImage::new(2, 2, &shifted).rows()
        );
    }

    #[test]
    fn no_upscaling_past_native_resolution() {
        let f = frame(3, 2, BitDepth::U8, vec![0, 1, 2, 3, 4, 5]);
        let img = AsciiImage::new(50, 30, &f);

        assert_eq!(img.width(), 3);
        assert_eq!(img.height(), 2);
        assert_eq!(img.rows().len(), 2);
        assert_eq!(img.rows()[0].len(), 6);
    }

    #[test]
    fn wide_image_clamps_width_and_scales_height() {
        let f = frame(4, 2, BitDepth::U8, vec![0; 8]);
        let img = AsciiImage::new(2, 30, &f);

        assert_eq!(img.width(), 2);
        assert_eq!(img.height(), 1);
    }

    #[test]
    fn flat_image_does_not_divide_by_zero() {
        let f = frame(2, 2, BitDepth::U8, vec![7, 7, 7, 7]);
        let img = AsciiImage::new(50, 30, &f);

        // 区间被撑开后所有 cell 都落在最暗一档
        assert_eq!(img.rows(), vec!["    ", "    "]);
    }

    #[test]
    fn signed_samples_accumulate_correctly() {
        let mut data = Vec::new();
        for v in [-100i16, 100] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let f = frame(2, 1, BitDepth::S16, data);
        let img = AsciiImage::new(50, 30, &f);

        assert_eq!(img.rows(), vec!["  @@"]);
    }

    #[test]
    #[should_panic(expected = "pixel buffer size mismatch")]
    fn size_mismatch_is_fatal() {
        let f = frame(2, 2, BitDepth::U16, vec![0; 4]);
        AsciiImage::new(50, 30, &f);
    }
}
