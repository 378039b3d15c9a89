//! Manifest command: package manifests per deployment group

use std::path::Path;

use anyhow::Result;

use super::output::Output;
use super::plan;
use crate::domain::ManifestBuilder;
use crate::storage::{load_catalog, Config, ManifestWriter};

/// Resolve the plan, then write the all-components and per-group manifests
pub fn run(
    output: &Output,
    config: &Config,
    edges_path: &Path,
    catalog_path: &Path,
    out_dir: &Path,
) -> Result<()> {
    let resolution = plan::resolve(output, config, edges_path)?;

    let (catalog, skipped) = load_catalog(catalog_path)?;
    output.verbose_ctx(
        "manifest",
        &format!(
            "Catalog {}: {} types, {} members",
            catalog.version(),
            catalog.type_count(),
            catalog.member_count()
        ),
    );
    for message in &skipped {
        output.warn(&format!("skipped catalog member: {}", message));
    }

    let naming = config.project.resolver.naming()?;
    let assignments = resolution.plan.assignments();
    let builder = ManifestBuilder::new(&catalog, &assignments, &naming)
        .with_options(config.project.manifest.options());
    let manifests = builder.build_all(resolution.plan.groups.len());

    let writer = ManifestWriter::new(out_dir, config.project.manifest.file_prefix.clone());
    let paths = writer.write_all(&manifests)?;

    if output.is_json() {
        let items: Vec<_> = manifests
            .iter()
            .zip(&paths)
            .map(|(manifest, path)| {
                serde_json::json!({
                    "file": path.display().to_string(),
                    "scope": manifest.scope,
                    "member_count": manifest.member_count,
                    "test_names": manifest.test_names,
                    "digest": manifest.digest(),
                    "warnings": manifest.warnings,
                })
            })
            .collect();
        output.data(&serde_json::json!({
            "manifests": items,
            "skipped_members": skipped,
        }));
        return Ok(());
    }

    for (manifest, path) in manifests.iter().zip(&paths) {
        for warning in &manifest.warnings {
            output.warn(&warning.to_string());
        }
        println!(
            "[+] {} ({}) ~ count: {}, tests: {}",
            path.display(),
            manifest.scope,
            manifest.member_count,
            manifest.test_names.join(", ")
        );
        output.verbose_ctx("manifest", &format!("{} blake3 {}", path.display(), manifest.digest()));
    }
    output.success(&format!(
        "Wrote {} manifests to {}",
        paths.len(),
        writer.dir().display()
    ));

    Ok(())
}
