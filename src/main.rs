use std::{collections::HashMap, io, path::PathBuf, process};

pub type CommonError = Box<dyn std::error::Error>;
pub type CommonResult<T> = std::result::Result<T, CommonError>;
use lazy_static::lazy_static;

mod ascii;
mod describe;
mod dicomdir;
mod formatter;
mod model;
mod service;
mod util;

lazy_static! {
    static ref FULL_MATCH_MAPPING: HashMap<String, String> =
        util::load_and_convert_tag_mapping().0;
    static ref PARTIAL_MATCH_MAPPING: HashMap<String, String> =
        util::load_and_convert_tag_mapping().1;
}

struct Args {
    path: PathBuf,
    export_dir: Option<PathBuf>,
}

fn parse_args() -> Option<Args> {
    let mut path = None;
    let mut export_dir = None;

    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        if arg == "--export-frames" {
            export_dir = Some(PathBuf::from(args.next()?));
        } else if path.is_none() {
            path = Some(PathBuf::from(arg));
        } else {
            return None;
        }
    }

    Some(Args {
        path: path?,
        export_dir,
    })
}

fn usage() -> ! {
    let exe_path = PathBuf::from(std::env::args().next().unwrap_or_default());
    let exe_name = exe_path
        .file_name()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_else(|| "dicomdir_describe".to_string());

    eprintln!(
        "Usage: {} path_to_dir_containing_DICOMDIR_file [--export-frames <dir>]",
        exe_name
    );

    process::exit(1);
}

fn main() {
    let args = match parse_args() {
        Some(v) => v,
        None => usage(),
    };

    if let Err(error) = run(&args) {
        eprintln!("{}", error);
        process::exit(1);
    }
}

fn run(args: &Args) -> CommonResult<()> {
    // 根文件加载失败直接中止整个运行
    let data_set = service::load(&args.path.join("DICOMDIR"))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let export_dir = args.export_dir.as_deref();

    if let Some(dir) = export_dir {
        std::fs::create_dir_all(dir)?;
    }

    describe::describe_data_set(&mut out, &args.path, &data_set, false, 0, export_dir)?;

    let dicom_dir = dicomdir::DicomDir::new(&data_set)?;

    if let Some(root) = dicom_dir.first_root_entry() {
        describe::describe_tree(&mut out, &args.path, &root, false, 1, export_dir)?;
    }

    Ok(())
}
