use std::collections::HashMap;

use crate::model::{DataSet, DicomValue};
use crate::CommonResult;

struct Record {
    data: DataSet,
    next: Option<usize>,
    child: Option<usize>,
}

// DICOMDIR 的目录树
// 记录都平铺在 0004,1220 序列里，层级关系靠文件内偏移串起来
// 这里在构造时就把偏移全部换算成下标，悬空的偏移直接报错
pub struct DicomDir {
    records: Vec<Record>,
    first_root: Option<usize>,
}

impl DicomDir {
    pub fn new(data_set: &DataSet) -> CommonResult<DicomDir> {
        let items = match data_set.get(0x0004, 0x1220).and_then(|e| e.buffers.first()) {
            Some(DicomValue::Sequence(items)) => items.clone(),
            _ => Vec::new(),
        };

        let mut by_offset = HashMap::new();

        for (index, item) in items.iter().enumerate() {
            by_offset.insert(item.offset as u32, index);
        }

        // 偏移 0 表示没有下一条/没有下级
        let resolve = |offset: u32| -> CommonResult<Option<usize>> {
            if offset == 0 {
                return Ok(None);
            }

            match by_offset.get(&offset) {
                Some(&index) => Ok(Some(index)),
                None => Err(format!(
                    "directory record offset {} does not point at any record",
                    offset
                )
                .into()),
            }
        };

        let mut records = Vec::with_capacity(items.len());

        for item in &items {
            let data = DataSet {
                elements: item.elements.clone(),
            };
            let next = resolve(data.get_u32(0x0004, 0x1400, 0))?;
            let child = resolve(data.get_u32(0x0004, 0x1420, 0))?;

            records.push(Record { data, next, child });
        }

        let first_root = resolve(data_set.get_u32(0x0004, 0x1200, 0))?;

        Ok(DicomDir {
            records,
            first_root,
        })
    }

    pub fn first_root_entry(&self) -> Option<DirEntry<'_>> {
        self.first_root.map(|index| DirEntry { dir: self, index })
    }
}

// 树里的游标
// 向兄弟记录推进会消耗掉当前游标，新旧游标不会同时存活
pub struct DirEntry<'a> {
    dir: &'a DicomDir,
    index: usize,
}

impl<'a> DirEntry<'a> {
    pub fn data_set(&self) -> &'a DataSet {
        &self.dir.records[self.index].data
    }

    pub fn has_children(&self) -> bool {
        self.dir.records[self.index].child.is_some()
    }

    pub fn has_next(&self) -> bool {
        self.dir.records[self.index].next.is_some()
    }

    pub fn first_child(&self) -> Option<DirEntry<'a>> {
        self.dir.records[self.index].child.map(|index| DirEntry {
            dir: self.dir,
            index,
        })
    }

    pub fn into_next(self) -> Option<DirEntry<'a>> {
        self.dir.records[self.index].next.map(|index| DirEntry {
            dir: self.dir,
            index,
        })
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::model::{DataElement, SequenceItem};

    fn ul(group: u16, element: u16, value: u32) -> DataElement {
        DataElement {
            group,
            element,
            vr: "UL".to_string(),
            buffers: vec![DicomValue::U32(vec![value])],
        }
    }

    fn cs(group: u16, element: u16, value: &str) -> DataElement {
        DataElement {
            group,
            element,
            vr: "CS".to_string(),
            buffers: vec![DicomValue::Str(vec![value.to_string()])],
        }
    }

    // 按 (偏移, 下一条, 下级, 记录类型) 组装一个 DICOMDIR 数据集
    pub fn dicom_dir_data_set(
        first_root: u32,
        records: &[(u32, u32, u32, &str)],
    ) -> DataSet {
        let items = records
            .iter()
            .map(|&(offset, next, child, kind)| SequenceItem {
                offset: offset as usize,
                elements: vec![
                    ul(0x0004, 0x1400, next),
                    ul(0x0004, 0x1420, child),
                    cs(0x0004, 0x1430, kind),
                ],
            })
            .collect();

        DataSet {
            elements: vec![
                ul(0x0004, 0x1200, first_root),
                DataElement {
                    group: 0x0004,
                    element: 0x1220,
                    vr: "SQ".to_string(),
                    buffers: vec![DicomValue::Sequence(items)],
                },
            ],
        }
    }

    #[test]
    fn resolves_offsets_into_links() {
        let ds = dicom_dir_data_set(
            10,
            &[
                (10, 20, 30, "PATIENT"),
                (20, 0, 0, "PATIENT"),
                (30, 0, 0, "STUDY"),
            ],
        );

        let dir = DicomDir::new(&ds).unwrap();
        let root = dir.first_root_entry().unwrap();

        assert!(root.has_next());
        assert!(root.has_children());

        let child = root.first_child().unwrap();
        assert_eq!(child.data_set().get_str(0x0004, 0x1430, ""), "STUDY");
        assert!(!child.has_next());

        let sibling = root.into_next().unwrap();
        assert_eq!(sibling.data_set().get_str(0x0004, 0x1430, ""), "PATIENT");
        assert!(sibling.into_next().is_none());
    }

    #[test]
    fn empty_directory_has_no_root_entry() {
        let ds = dicom_dir_data_set(0, &[]);
        let dir = DicomDir::new(&ds).unwrap();

        assert!(dir.first_root_entry().is_none());
    }

    #[test]
    fn dangling_offset_is_a_structural_error() {
        let ds = dicom_dir_data_set(10, &[(10, 999, 0, "PATIENT")]);

        assert!(DicomDir::new(&ds).is_err());
    }
}
