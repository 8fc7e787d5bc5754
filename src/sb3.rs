use crate::project::Project;
use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::fs;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

/// Loads a project from a `.sb3` archive, or from a bare `project.json` when
/// the path has a `.json` extension.
pub fn load_project(input: &Path) -> Result<Project> {
    let is_json = input
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let project_json = if is_json {
        let text = fs::read_to_string(input)
            .with_context(|| format!("Failed to read '{}'.", input.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid project.json '{}'.", input.display()))?
    } else {
        read_project_json(input)?
    };
    Project::from_json(&project_json)
        .with_context(|| format!("Failed to load project from '{}'.", input.display()))
}

pub fn read_project_json(input: &Path) -> Result<Value> {
    let file =
        fs::File::open(input).with_context(|| format!("Failed to open '{}'.", input.display()))?;
    let mut zip = ZipArchive::new(file)
        .with_context(|| format!("'{}' is not a valid zip/.sb3 file.", input.display()))?;
    project_json_from_zip(&mut zip)
        .with_context(|| format!("Failed to read project.json from '{}'.", input.display()))
}

pub fn read_project_json_bytes(bytes: &[u8]) -> Result<Value> {
    let mut zip = ZipArchive::new(Cursor::new(bytes))
        .map_err(|_| anyhow!("Input is not a valid .sb3 archive."))?;
    project_json_from_zip(&mut zip)
}

fn project_json_from_zip<R: Read + Seek>(zip: &mut ZipArchive<R>) -> Result<Value> {
    let mut project_json_str = String::new();
    {
        let mut entry = zip
            .by_name("project.json")
            .map_err(|_| anyhow!("project.json not found in archive."))?;
        entry
            .read_to_string(&mut project_json_str)
            .context("Failed reading project.json.")?;
    }
    serde_json::from_str(&project_json_str).context("Invalid project.json inside archive.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn archive(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut out = Cursor::new(Vec::<u8>::new());
        {
            let mut zip = zip::ZipWriter::new(&mut out);
            let opts =
                SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
            for (name, body) in entries {
                zip.start_file(*name, opts).unwrap();
                zip.write_all(body.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        out.into_inner()
    }

    #[test]
    fn reads_project_json_entry() {
        let bytes = archive(&[
            ("project.json", r#"{"targets": []}"#),
            ("abc.svg", "<svg/>"),
        ]);
        let value = read_project_json_bytes(&bytes).unwrap();
        assert!(value.get("targets").unwrap().as_array().unwrap().is_empty());
    }

    #[test]
    fn missing_project_json_is_an_error() {
        let bytes = archive(&[("abc.svg", "<svg/>")]);
        let err = read_project_json_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("project.json"));
    }

    #[test]
    fn garbage_is_not_an_archive() {
        assert!(read_project_json_bytes(b"not a zip").is_err());
    }
}
