use std::path::PathBuf;

use aaru_fl4::{Codepage, Fl4ReaderOptions, Fl4WriterOptions};
use clap::Args;

pub mod create;
pub mod extract;

#[derive(Args)]
pub struct CommonArgs {
    /// The archive to extract, or the directory to pack
    #[arg(long = "in", value_name = "PATH")]
    pub input: PathBuf,

    /// The directory to extract into, or the archive to create
    #[arg(long = "out", value_name = "PATH")]
    pub output: PathBuf,

    /// Encoding of the entry names, a label such as `shift_jis` or a windows
    /// codepage number such as `932`
    #[arg(long = "cp", value_name = "CODEPAGE", value_parser = parse_codepage)]
    pub codepage: Codepage,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,

    /// Fail on compressed entries that do not decode to their declared size
    #[arg(long, default_value_t = false)]
    pub strict: bool,

    /// Extension of the entries to compress when creating an archive
    #[arg(long, value_name = "EXT", default_value = ".BM2")]
    pub compress: Vec<String>,
}

impl CommonArgs {
    fn reader_options(&self) -> Fl4ReaderOptions {
        Fl4ReaderOptions::builder()
            .codepage(self.codepage)
            .strict_length(self.strict)
            .build()
    }

    fn writer_options(&self) -> Fl4WriterOptions {
        Fl4WriterOptions::builder()
            .codepage(self.codepage)
            .compressed_extensions(self.compress.clone())
            .build()
    }
}

fn parse_codepage(label: &str) -> Result<Codepage, String> {
    Codepage::for_label(label).map_err(|e| e.to_string())
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::path::PathBuf;

    use aaru_fl4::Codepage;
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use super::CommonArgs;

    fn args(input: PathBuf, output: PathBuf) -> CommonArgs {
        CommonArgs {
            input,
            output,
            codepage: Codepage::SHIFT_JIS,
            overwrite: false,
            strict: true,
            compress: vec![".BM2".to_owned()],
        }
    }

    #[traced_test]
    #[test]
    fn create_then_extract() -> miette::Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source");
        fs::create_dir_all(source.join("gfx")).unwrap();
        fs::write(source.join("README.TXT"), b"readme").unwrap();
        fs::write(source.join("gfx").join("タイトル.BM2"), vec![7; 2048]).unwrap();

        let archive = dir.path().join("data.fl4");
        args(source.clone(), archive.clone()).create()?;
        assert!(archive.exists());

        // the archive is never replaced without --overwrite
        assert!(args(source.clone(), archive.clone()).create().is_err());

        let target = dir.path().join("target");
        args(archive.clone(), target.clone()).extract()?;
        assert_eq!(fs::read(target.join("README.TXT")).unwrap(), b"readme");
        assert_eq!(
            fs::read(target.join("gfx").join("タイトル.BM2")).unwrap(),
            vec![7; 2048]
        );

        // neither are extracted files
        assert!(args(archive.clone(), target.clone()).extract().is_err());
        let mut overwrite = args(archive, target);
        overwrite.overwrite = true;
        overwrite.extract()?;

        Ok(())
    }

    #[traced_test]
    #[test]
    fn create_from_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("data.fl4");

        assert!(args(dir.path().join("does-not-exist"), archive.clone())
            .create()
            .is_err());
        assert!(!archive.exists());

        // nothing to pack is an error too
        let empty = dir.path().join("empty");
        fs::create_dir_all(&empty).unwrap();
        assert!(args(empty, archive.clone()).create().is_err());
        assert!(!archive.exists());
    }

    #[traced_test]
    #[test]
    fn extract_keeps_names_that_decode_alike() -> miette::Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("あ.TXT"), b"a").unwrap();
        fs::write(source.join("い.TXT"), b"i").unwrap();

        let archive = dir.path().join("data.fl4");
        args(source, archive.clone()).create()?;

        // both names turn into the same replacement characters
        let mut wrong_codepage = args(archive, dir.path().join("target"));
        wrong_codepage.codepage = Codepage::UTF_8;
        assert!(wrong_codepage.extract().is_err());

        Ok(())
    }
}
