use std::fs;
use std::path::Path;

use aaru_fl4::error::{Error, Result as Fl4Result};
use aaru_fl4::write::write_to_path;
use miette::{miette, Context, IntoDiagnostic, Result};
use tracing::{info, instrument};
use walkdir::WalkDir;

use super::CommonArgs;

/// Name of `path` inside the archive, relative to `root` and joined with `\`
fn entry_name(root: &Path, path: &Path) -> Fl4Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        Error::CustomError(format!(
            "{} is not inside {}",
            path.display(),
            root.display()
        ))
    })?;

    let components = relative
        .iter()
        .map(|component| {
            component.to_str().ok_or(Error::CustomError(format!(
                "unable to convert {} to a string",
                relative.display()
            )))
        })
        .collect::<Fl4Result<Vec<_>>>()?;

    Ok(components.join("\\"))
}

impl CommonArgs {
    /// Pack every file below the input directory into a new archive
    #[instrument(skip_all, fields(archive = %self.output.display()))]
    pub fn create(&self) -> Result<()> {
        info!("creating {}", &self.output.display());

        let files = WalkDir::new(&self.input)
            .sort_by_file_name()
            .into_iter()
            .filter(|e| !matches!(e, Ok(e) if !e.file_type().is_file()))
            .collect::<Result<Vec<_>, _>>()
            .into_diagnostic()
            .context(format!("reading {}", &self.input.display()))?;

        if files.is_empty() {
            return Err(miette!("directory {} is empty", &self.input.display()));
        }

        let count = files.len();
        let entries = files
            .iter()
            .enumerate()
            .map(|(i, file)| -> Fl4Result<(String, Vec<u8>)> {
                let name = entry_name(&self.input, file.path())?;
                info!("adding {} [{}/{}]", name, i + 1, count);

                let data = fs::read(file.path())?;
                Ok((name, data))
            });

        write_to_path(&self.output, self.overwrite, self.writer_options(), entries)
            .context(format!("creating {}", &self.output.display()))?;

        info!("packed {} entries", count);
        Ok(())
    }
}
