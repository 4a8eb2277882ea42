use std::fs::{self, File};
use std::io::Write;

use aaru_fl4::{error::Error, Fl4Archive};
use miette::{Context, IntoDiagnostic, Result};
use tracing::{info, instrument};

use super::CommonArgs;

impl CommonArgs {
    /// Extract every entry of the archive under the output directory
    #[instrument(skip_all, fields(archive = %self.input.display()))]
    pub fn extract(&self) -> Result<()> {
        let file = File::open(&self.input)
            .into_diagnostic()
            .context(format!("path: {}", &self.input.display()))?;
        let mut fl4 = Fl4Archive::new(file, self.reader_options())?;

        // every index record, names that decode alike included
        let count = fl4.entry_count();
        for i in 0..count {
            let entry = fl4.by_entry(i)?;
            let name = entry.name().to_owned();
            let relative = entry
                .enclosed_name()
                .ok_or_else(|| Error::UnsafeName(name.clone()))?;

            let path = self.output.join(relative);
            info!("extracting {} [{}/{}]", name, i + 1, count);

            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .into_diagnostic()
                    .context(format!("creating {}", parent.display()))?;
            }

            let mut out = if !self.overwrite {
                File::create_new(&path)
                    .into_diagnostic()
                    .context(format!("creating {}", &path.display()))?
            } else {
                File::create(&path)
                    .into_diagnostic()
                    .context(format!("creating {}", &path.display()))?
            };

            out.write_all(&entry.into_data())
                .into_diagnostic()
                .context(format!("writing {}", &path.display()))?;
        }

        info!("extracted {} entries", count);
        Ok(())
    }
}
