use std::io::Write;
use std::path::Path;

use crate::ascii::AsciiImage;
use crate::dicomdir::DirEntry;
use crate::model::{DataSet, Frame};
use crate::{formatter, service, util, CommonResult};

pub fn pad(level: usize) -> String {
    " ".repeat(level * 4)
}

// 打印一个数据集的全部元素
// 碰到指向图像文件的目录记录就加载那个文件并递归描述
// has_images 为真时再把每一帧渲染出来
pub fn describe_data_set(
    out: &mut dyn Write,
    path: &Path,
    data_set: &DataSet,
    has_images: bool,
    level: usize,
    export_dir: Option<&Path>,
) -> CommonResult<()> {
    let p = pad(level);

    let mut refers_to_image = false;

    for tag in &data_set.elements {
        let text = formatter::tag_to_string(tag);

        writeln!(
            out,
            "{}{:x}_{:x}: {} - {}",
            p,
            tag.group,
            tag.element,
            text,
            util::get_tag_description(&tag.tag_key())
        )?;

        if tag.group == 0x0004 && tag.element == 0x1430 && text == "CS: IMAGE" {
            refers_to_image = true;
        }
    }

    if refers_to_image {
        let tag = data_set
            .get(0x0004, 0x1500)
            .ok_or("image record carries no Referenced File ID")?;

        let mut img_path = path.to_path_buf();

        for item in formatter::flatten_str(tag) {
            img_path.push(item);
        }

        writeln!(out, "{}REFERS TO IMAGE at path {:?}", p, img_path)?;

        // 引用文件加载失败不兜底，整个运行在这里中止
        let img_ds = service::load(&img_path)?;

        describe_data_set(out, &img_path, &img_ds, true, level + 1, export_dir)?;
    }

    if has_images {
        let frame_count = data_set.frame_count();

        for index in 0..frame_count {
            // 单帧失败只影响这一帧
            match data_set.get_frame(index) {
                Ok(frame) => {
                    writeln!(out, "{}Image {}", p, index)?;
                    preview_image(out, &frame, level)?;

                    if let Some(dir) = export_dir {
                        let file = dir.join(format!("frame_{:04}.png", index));

                        if let Err(error) = service::export_frame_png(&frame, &file) {
                            writeln!(out, "{}Image index: {} - export failure: {}", p, index, error)?;
                        }
                    }
                }
                Err(error) => {
                    writeln!(out, "{}Image index: {} - getImage failure: {}", p, index, error)?;
                }
            }
        }

        writeln!(out, "{}Image count: {}", p, frame_count)?;
    }

    writeln!(out, "----")?;

    Ok(())
}

fn preview_image(out: &mut dyn Write, frame: &Frame, level: usize) -> CommonResult<()> {
    let pimg = format!("{}> ", pad(level));

    writeln!(out, "{}size: {} x {}", pimg, frame.width, frame.height)?;
    writeln!(out, "{}color space: {}", pimg, frame.color_space)?;
    writeln!(out, "{}channels: {}", pimg, frame.channels)?;
    writeln!(out, "{}depth: {}", pimg, frame.depth.name())?;
    writeln!(out, "{}hi_bit: {}", pimg, frame.high_bit)?;

    let ascii_img = AsciiImage::new(50, 30, frame);

    for row in ascii_img.rows() {
        writeln!(out, "{}{}", pimg, row)?;
    }

    Ok(())
}

// 先序深度优先：先描述当前记录，再下钻第一个子记录，然后沿兄弟链推进
// 每层最多完整描述 3 条兄弟记录，之后打一行省略号收束
pub fn describe_tree(
    out: &mut dyn Write,
    path: &Path,
    entry: &DirEntry<'_>,
    has_images: bool,
    level: usize,
    export_dir: Option<&Path>,
) -> CommonResult<()> {
    describe_data_set(out, path, entry.data_set(), has_images, level, export_dir)?;

    let mut e = match entry.first_child() {
        Some(child) => child,
        None => return Ok(()),
    };

    let mut index = 0;

    loop {
        describe_tree(out, path, &e, false, level + 1, export_dir)?;

        if !e.has_next() {
            break;
        }

        index += 1;

        if index == 3 {
            writeln!(out, "{}...", pad(level + 1))?;
            break;
        }

        // into_next 消耗掉旧游标再给出新的，两者不会同时存活
        e = match e.into_next() {
            Some(next) => next,
            None => break,
        };
    }

    Ok(())
}
