//! Template assembly: `{{name}}` placeholders filled from HTML fragments.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use crate::error::{BuildError, Stage, StageExt};
use crate::fs::{sorted_entries, FileSystem};

/// Extension a fragment file must carry.
pub const FRAGMENT_SUFFIX: &str = ".html";

/// Lowercase ASCII identifiers in double braces. No nesting, no escapes.
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([a-z]+)\}\}").expect("Invalid placeholder regex"));

/// A named HTML fragment loaded from `<name>.html`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub name: String,
    pub content: String,
    pub path: PathBuf,
}

/// Fragments of one build, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct Fragments {
    by_name: HashMap<String, Fragment>,
}

impl Fragments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fragment. Two fragments may not share a name.
    pub fn insert(&mut self, fragment: Fragment) -> Result<(), BuildError> {
        if self.by_name.contains_key(&fragment.name) {
            return Err(BuildError::DuplicateFragment {
                name: fragment.name,
                path: fragment.path,
            });
        }
        self.by_name.insert(fragment.name.clone(), fragment);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Fragment> {
        self.by_name.get(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Load every `.html` file directly inside `dir` as a fragment.
pub fn load_fragments(fs: &dyn FileSystem, dir: &Path) -> Result<Fragments, BuildError> {
    let mut fragments = Fragments::new();

    for entry in sorted_entries(fs, dir).stage(Stage::Assemble)? {
        if !entry.is_file_with_suffix(FRAGMENT_SUFFIX) {
            continue;
        }

        let Some(name) = entry
            .name_str()
            .and_then(|n| n.strip_suffix(FRAGMENT_SUFFIX))
            .filter(|n| !n.is_empty())
        else {
            continue;
        };

        let path = dir.join(&entry.name);
        let content = fs.read_to_string(&path).stage(Stage::Assemble)?;

        if !name.bytes().all(|b| b.is_ascii_lowercase()) {
            debug!(path = %path.display(), "fragment name matches no placeholder");
        }

        debug!(name, path = %path.display(), "loaded fragment");
        fragments.insert(Fragment {
            name: name.to_string(),
            content,
            path,
        })?;
    }

    Ok(fragments)
}

/// Outcome of substituting placeholders in a template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitution {
    /// Template text with every placeholder replaced
    pub html: String,

    /// Placeholder occurrences filled from a fragment
    pub resolved: usize,

    /// Distinct placeholder names with no fragment, removed from the output
    pub unresolved: Vec<String>,
}

/// Replace each placeholder in `template` with its fragment, or with nothing.
///
/// Runs once over the template text; inserted fragment content is never
/// scanned for placeholders.
pub fn substitute(template: &str, fragments: &Fragments) -> Substitution {
    let mut resolved = 0;
    let mut unresolved = BTreeSet::new();

    let html = PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| match fragments.get(&caps[1]) {
            Some(fragment) => {
                resolved += 1;
                fragment.content.clone()
            }
            None => {
                unresolved.insert(caps[1].to_string());
                String::new()
            }
        })
        .into_owned();

    Substitution {
        html,
        resolved,
        unresolved: unresolved.into_iter().collect(),
    }
}

/// Summary of one template assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assembly {
    pub fragments: usize,
    pub resolved: usize,
    pub unresolved: Vec<String>,
}

/// Read `template_file`, fill it from the fragments in `fragments_dir`, and
/// write the result to `output`.
///
/// Nothing is written unless the template and every fragment were read.
pub fn assemble(
    fs: &dyn FileSystem,
    template_file: &Path,
    fragments_dir: &Path,
    output: &Path,
) -> Result<Assembly, BuildError> {
    let template = fs.read_to_string(template_file).stage(Stage::Assemble)?;
    let fragments = load_fragments(fs, fragments_dir)?;
    if fragments.is_empty() {
        debug!(dir = %fragments_dir.display(), "no fragments found");
    }

    let substitution = substitute(&template, &fragments);

    for name in &substitution.unresolved {
        debug!(placeholder = %name, "no fragment for placeholder, removed");
    }

    fs.write(output, substitution.html.as_bytes())
        .stage(Stage::Assemble)?;

    Ok(Assembly {
        fragments: fragments.len(),
        resolved: substitution.resolved,
        unresolved: substitution.unresolved,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFs;
    use pretty_assertions::assert_eq;

    fn fragments(pairs: &[(&str, &str)]) -> Fragments {
        let mut set = Fragments::new();
        for (name, content) in pairs {
            set.insert(Fragment {
                name: name.to_string(),
                content: content.to_string(),
                path: PathBuf::from(format!("{name}.html")),
            })
            .unwrap();
        }
        set
    }

    #[test]
    fn fills_known_and_drops_unknown() {
        let set = fragments(&[("header", "<h1>Hi</h1>")]);

        let out = substitute("<div>{{header}}{{missing}}</div>", &set);

        assert_eq!(out.html, "<div><h1>Hi</h1></div>");
        assert_eq!(out.resolved, 1);
        assert_eq!(out.unresolved, vec!["missing".to_string()]);
    }

    #[test]
    fn fills_repeated_placeholders() {
        let set = fragments(&[("sep", "<hr>")]);

        let out = substitute("{{sep}}a{{sep}}b{{sep}}", &set);

        assert_eq!(out.html, "<hr>a<hr>b<hr>");
        assert_eq!(out.resolved, 3);
    }

    #[test]
    fn does_not_expand_fragment_content() {
        let set = fragments(&[("loop", "before {{loop}} after"), ("other", "X")]);

        let out = substitute("[{{loop}}]", &set);

        assert_eq!(out.html, "[before {{loop}} after]");
    }

    #[test]
    fn leaves_non_matching_braces_alone() {
        let set = fragments(&[("header", "H")]);

        let out = substitute("{{Header}} {{head_er}} {{ header }} {{}} {header}", &set);

        assert_eq!(out.html, "{{Header}} {{head_er}} {{ header }} {{}} {header}");
        assert!(out.unresolved.is_empty());
    }

    #[test]
    fn innermost_braces_match() {
        let set = fragments(&[("a", "1")]);

        let out = substitute("{{{a}}}", &set);

        assert_eq!(out.html, "{1}");
    }

    #[test]
    fn duplicate_fragment_is_error() {
        let mut set = fragments(&[("header", "a")]);

        let err = set
            .insert(Fragment {
                name: "header".to_string(),
                content: "b".to_string(),
                path: PathBuf::from("other/header.html"),
            })
            .unwrap_err();

        assert!(matches!(err, BuildError::DuplicateFragment { ref name, .. } if name == "header"));
        assert_eq!(err.stage(), Stage::Assemble);
    }

    #[test]
    fn loads_only_html_files() {
        let mem = MemoryFs::new();
        mem.add_file("/p/components/header.html", "<h1>Hi</h1>");
        mem.add_file("/p/components/notes.txt", "nope");
        mem.add_file("/p/components/nested/footer.html", "nope");
        mem.add_file("/p/components/about.HTML", "nope");

        let set = load_fragments(&mem, Path::new("/p/components")).unwrap();

        assert_eq!(set.len(), 1);
        assert_eq!(set.get("header").unwrap().content, "<h1>Hi</h1>");
    }

    #[test]
    fn assembles_to_output_file() {
        let mem = MemoryFs::new();
        mem.add_file("/p/template.html", "<body>{{header}}{{articles}}{{missing}}</body>");
        mem.add_file("/p/components/header.html", "<header></header>");
        mem.add_file("/p/components/articles.html", "<main></main>");
        mem.add_dir("/p/out");

        let assembly = assemble(
            &mem,
            Path::new("/p/template.html"),
            Path::new("/p/components"),
            Path::new("/p/out/index.html"),
        )
        .unwrap();

        assert_eq!(assembly.fragments, 2);
        assert_eq!(assembly.resolved, 2);
        assert_eq!(
            mem.contents("/p/out/index.html"),
            Some(b"<body><header></header><main></main></body>".to_vec())
        );
    }

    #[test]
    fn missing_fragments_dir_writes_nothing() {
        let mem = MemoryFs::new();
        mem.add_file("/p/template.html", "{{header}}");
        mem.add_dir("/p/out");

        let err = assemble(
            &mem,
            Path::new("/p/template.html"),
            Path::new("/p/components"),
            Path::new("/p/out/index.html"),
        )
        .unwrap_err();

        assert_eq!(err.stage(), Stage::Assemble);
        assert_eq!(err.path(), Path::new("/p/components"));
        assert!(!mem.exists("/p/out/index.html"));
    }

    #[test]
    fn missing_template_is_assemble_error() {
        let mem = MemoryFs::new();
        mem.add_dir("/p/components");
        mem.add_dir("/p/out");

        let err = assemble(
            &mem,
            Path::new("/p/template.html"),
            Path::new("/p/components"),
            Path::new("/p/out/index.html"),
        )
        .unwrap_err();

        assert_eq!(err.stage(), Stage::Assemble);
        assert!(err.fs_error().is_some_and(|e| e.is_not_found()));
    }
}
