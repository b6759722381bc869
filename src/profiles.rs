//! Preset conversion profiles.
//!
//! A profile bundles a default template, derived pandoc arguments, an output
//! naming pattern, and default formats under one name. Profiles are immutable
//! after construction; the registry is an explicit object handed to whoever
//! needs lookups — there is no process-wide mutable profile table.

use crate::config::TargetFormat;
use crate::error::Md2DocError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// An immutable named bundle of conversion defaults.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    /// Identifier (lowercase, no spaces).
    pub name: String,
    /// Human-readable name for listings.
    pub display_name: String,
    /// Short description of the profile's purpose.
    pub description: String,
    /// Default docx reference template (relative or absolute).
    pub default_template: Option<PathBuf>,
    /// Output naming pattern, e.g. `{title}_Angebot.docx`.
    pub output_naming: Option<String>,
    /// Formats produced when the caller does not choose any.
    pub default_formats: Vec<TargetFormat>,
    /// Include a table of contents.
    pub toc: bool,
    /// Number sections.
    pub number_sections: bool,
    /// Extra pandoc arguments, including those derived from the flags above.
    pub pandoc_args: Vec<String>,
}

/// Builder-style constructor args for [`Profile`]; collapses the flag-derived
/// argument handling into one place.
#[derive(Clone, Copy)]
pub struct ProfileSpec {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub default_template: Option<&'static str>,
    pub pandoc_args: &'static [&'static str],
    pub output_naming: Option<&'static str>,
    pub toc: bool,
    pub number_sections: bool,
}

impl Profile {
    fn from_spec(spec: ProfileSpec) -> Self {
        let mut pandoc_args: Vec<String> =
            spec.pandoc_args.iter().map(|s| s.to_string()).collect();
        // `--toc` / `--number-sections` contribute exactly once, even when
        // the spec's raw args already carry them.
        if spec.toc && !pandoc_args.iter().any(|a| a == "--toc") {
            pandoc_args.push("--toc".to_string());
        }
        if spec.number_sections && !pandoc_args.iter().any(|a| a == "--number-sections") {
            pandoc_args.push("--number-sections".to_string());
        }
        Profile {
            name: spec.name.to_string(),
            display_name: spec.display_name.to_string(),
            description: spec.description.to_string(),
            default_template: spec.default_template.map(PathBuf::from),
            output_naming: spec.output_naming.map(str::to_string),
            default_formats: vec![TargetFormat::Docx],
            toc: spec.toc,
            number_sections: spec.number_sections,
            pandoc_args,
        }
    }

    /// Resolve this profile's template against `base_dir`, then the current
    /// working directory. Returns `None` when unset or not found.
    pub fn template_path(&self, base_dir: Option<&Path>) -> Option<PathBuf> {
        resolve_template_path(self.default_template.as_deref(), base_dir)
    }
}

/// Resolve a (possibly relative) template path.
///
/// Absolute paths are returned as-is when they exist; relative paths are
/// tried against `base_dir` first and the working directory second.
pub fn resolve_template_path(
    template: Option<&Path>,
    base_dir: Option<&Path>,
) -> Option<PathBuf> {
    let template = template?;
    if template.is_absolute() {
        return template.exists().then(|| template.to_path_buf());
    }
    if let Some(base) = base_dir {
        let resolved = base.join(template);
        if resolved.exists() {
            return Some(resolved);
        }
    }
    template.exists().then(|| template.to_path_buf())
}

/// Registry of available profiles: the built-ins plus anything registered
/// locally. Lookup-only after construction; `register` exists so embedding
/// applications can add their own bundles before handing the registry out.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, Profile>,
}

impl ProfileRegistry {
    /// An empty registry, for callers that want full control.
    pub fn new() -> Self {
        Self {
            profiles: BTreeMap::new(),
        }
    }

    /// The built-in profile set.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for spec in BUILTIN_PROFILES {
            registry
                .profiles
                .insert(spec.name.to_string(), Profile::from_spec(*spec));
        }
        registry
    }

    /// Register a profile, replacing any existing one with the same name.
    pub fn register(&mut self, profile: Profile) -> Result<(), Md2DocError> {
        if profile.name.is_empty() {
            return Err(Md2DocError::InvalidConfig(
                "profile name cannot be empty".into(),
            ));
        }
        info!("registered profile: {}", profile.name);
        self.profiles.insert(profile.name.clone(), profile);
        Ok(())
    }

    /// Look up a profile by name.
    pub fn get(&self, name: &str) -> Result<&Profile, Md2DocError> {
        self.profiles
            .get(name)
            .ok_or_else(|| Md2DocError::ProfileNotFound {
                name: name.to_string(),
                available: self.names().join(", "),
            })
    }

    /// All registered profile names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    /// All registered profiles, sorted by name, for listings.
    pub fn list(&self) -> Vec<&Profile> {
        self.profiles.values().collect()
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

const BUILTIN_PROFILES: &[ProfileSpec] = &[
    ProfileSpec {
        name: "angebot",
        display_name: "Angebot",
        description: "Angebotsdokumente mit Inhaltsverzeichnis",
        default_template: None,
        pandoc_args: &[],
        output_naming: Some("{title}_Angebot.docx"),
        toc: true,
        number_sections: true,
    },
    ProfileSpec {
        name: "bericht",
        display_name: "Bericht",
        description: "Berichte und Reports mit nummerierter Gliederung",
        default_template: None,
        pandoc_args: &["--standalone"],
        output_naming: Some("{title}_Bericht.docx"),
        toc: true,
        number_sections: true,
    },
    ProfileSpec {
        name: "analyse",
        display_name: "Analyse",
        description: "Analysedokumente mit detaillierter Struktur",
        default_template: None,
        pandoc_args: &[],
        output_naming: Some("{title}_Analyse.docx"),
        toc: true,
        number_sections: true,
    },
    ProfileSpec {
        name: "script",
        display_name: "Script",
        description: "Schulungsunterlagen und Scripts",
        default_template: None,
        pandoc_args: &[],
        output_naming: Some("{title}_Script.docx"),
        toc: true,
        number_sections: false,
    },
];
