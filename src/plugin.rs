/// Prompt-driven plugin code generation
///
/// Builds a detailed generation prompt from a declarative plugin request,
/// streams the pro model's response and splits it into project files. The
/// result can be written out as a directory tree or a zip archive.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use crate::constants::models;
use crate::gemini::{Content, GeminiClient, Part};
use crate::splitter::{GeneratedFile, ResponseSplitter};

/// Input type for one settings-page field of a WordPress plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Textarea,
    Checkbox,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Textarea => "textarea",
            FieldType::Checkbox => "checkbox",
        }
    }
}

impl FromStr for FieldType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(FieldType::Text),
            "textarea" => Ok(FieldType::Textarea),
            "checkbox" => Ok(FieldType::Checkbox),
            other => anyhow::bail!(
                "Unknown field type '{}' (expected text, textarea or checkbox)",
                other
            ),
        }
    }
}

/// One field on the generated settings page. Its option name in the
/// wp_options table is derived from the plugin name plus `name`.
#[derive(Debug, Clone)]
pub struct SettingsField {
    pub field_type: FieldType,
    pub label: String,
    pub name: String,
}

impl FromStr for SettingsField {
    type Err = anyhow::Error;

    /// Parses the `label:name:type` form used on the command line
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, ':');
        let label = parts.next().unwrap_or_default().trim();
        let name = parts.next().map(str::trim);
        let field_type = parts.next().map(str::trim);

        if label.is_empty() {
            anyhow::bail!("Field '{}' is missing a label (expected label:name[:type])", s);
        }
        let name = match name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => anyhow::bail!("Field '{}' is missing a name (expected label:name[:type])", s),
        };
        let field_type = match field_type {
            Some(t) => t.parse()?,
            None => FieldType::Text,
        };

        Ok(SettingsField {
            field_type,
            label: label.to_string(),
            name,
        })
    }
}

pub const WORDPRESS_FEATURES: [&str; 4] = [
    "Admin Menu Page",
    "Shortcode",
    "Widget",
    "Custom Post Type",
];

#[derive(Debug, Clone)]
pub struct WordPressPlugin {
    pub name: String,
    pub description: String,
    pub version: String,
    pub author: String,
    pub features: Vec<String>,
    pub fields: Vec<SettingsField>,
}

#[derive(Debug, Clone)]
pub struct BrowserExtension {
    pub name: String,
    pub description: String,
    pub functionality: String,
}

pub enum PluginRequest {
    WordPress(WordPressPlugin),
    Browser(BrowserExtension),
}

impl PluginRequest {
    pub fn prompt(&self) -> String {
        match self {
            PluginRequest::WordPress(plugin) => build_wordpress_prompt(plugin),
            PluginRequest::Browser(extension) => build_browser_prompt(extension),
        }
    }

    /// Filename a marker-free response collapses into. Only WordPress
    /// responses have one; a browser extension without markers is unusable.
    pub fn implicit_filename(&self) -> Option<String> {
        match self {
            PluginRequest::WordPress(plugin) => Some(format!("{}.php", hyphen_slug(&plugin.name))),
            PluginRequest::Browser(_) => None,
        }
    }

    pub fn project_slug(&self) -> String {
        match self {
            PluginRequest::WordPress(plugin) => hyphen_slug(&plugin.name),
            PluginRequest::Browser(extension) => hyphen_slug(&extension.name),
        }
    }
}

/// Lowercase with whitespace replaced by underscores (wp_options prefix)
pub fn underscore_slug(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Lowercase with whitespace replaced by hyphens (file and archive names)
pub fn hyphen_slug(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect()
}

fn build_wordpress_prompt(plugin: &WordPressPlugin) -> String {
    let mut prompt = String::from(
        "Act as a professional WordPress plugin developer. Generate the complete PHP code \
         for a single-file WordPress plugin with the following specifications:\n\n",
    );
    prompt.push_str(&format!("**Plugin Name:** {}\n", plugin.name));
    prompt.push_str(&format!("**Description:** {}\n", plugin.description));
    prompt.push_str(&format!("**Version:** {}\n", plugin.version));
    prompt.push_str(&format!("**Author:** {}\n\n", plugin.author));
    prompt.push_str(&format!("**Core Features:**\n- {}\n\n", plugin.features.join("\n- ")));

    if plugin.features.iter().any(|f| f == "Admin Menu Page") {
        prompt.push_str("**Admin Menu Page Details:**\n");
        prompt.push_str(&format!(
            "- Create a top-level menu page titled \"{}\".\n",
            plugin.name
        ));
        prompt.push_str("- The page should have a settings form.\n");
        prompt.push_str(
            "- The form should include the following fields to be saved in the wp_options table:\n",
        );
        for field in &plugin.fields {
            prompt.push_str(&format!(
                "  - **Type:** {}, **Label:** \"{}\", **Option Name:** \"{}_{}\"\n",
                field.field_type.as_str(),
                field.label,
                underscore_slug(&plugin.name),
                field.name
            ));
        }
        prompt.push_str(
            "- Use the Settings API to register settings and sanitize fields appropriately.\n\n",
        );
    }

    prompt.push_str(
        "**Instructions:**\n\
         - Provide the code as a single, complete PHP file, including the plugin header comment block.\n\
         - Ensure the code is secure, well-documented with inline comments, and follows WordPress coding standards.",
    );
    prompt
}

fn build_browser_prompt(extension: &BrowserExtension) -> String {
    let mut prompt = String::from(
        "Act as a professional browser extension developer. Generate all the necessary files \
         for a Google Chrome browser extension (Manifest V3) with the following specifications:\n\n",
    );
    prompt.push_str(&format!("**Extension Name:** {}\n", extension.name));
    prompt.push_str(&format!("**Description:** {}\n\n", extension.description));
    prompt.push_str(&format!("**Core Functionality:**\n{}\n\n", extension.functionality));
    prompt.push_str("**Instructions:**\n");
    prompt.push_str(
        "- Generate the complete code for all required files, including manifest.json, \
         popup.html, popup.js, content scripts, background scripts, etc., as needed to fulfill the request.\n",
    );
    prompt.push_str(
        "- For each file, clearly mark the beginning of its content with a comment like: // FILENAME: manifest.json\n",
    );
    prompt.push_str(
        "- Ensure the manifest.json is correctly configured with broad permissions suitable for a \
         powerful extension. Include \"storage\", \"tabs\", \"scripting\", and host permissions for \
         all websites (\"<all_urls>\") to ensure the core functionality can be implemented without \
         permission issues.\n",
    );
    prompt.push_str("- Write modern, clean, and well-commented JavaScript, HTML, and CSS.\n");
    prompt
}

/// Stream the generation and split it into files as chunks arrive.
/// `on_progress` fires with the current file list after every chunk.
pub fn generate(
    client: &GeminiClient,
    request: &PluginRequest,
    on_progress: &mut dyn FnMut(&[GeneratedFile]),
) -> Result<Vec<GeneratedFile>> {
    let contents = [Content::user(vec![Part::text(request.prompt())])];
    let implicit = request.implicit_filename();

    let mut splitter = ResponseSplitter::new();
    client.generate_content_stream(models::PRO, &contents, None, &mut |chunk| {
        splitter.push_chunk(chunk);
        on_progress(&splitter.files(implicit.as_deref()));
    })?;

    let files = splitter.files(implicit.as_deref());
    if files.is_empty() {
        anyhow::bail!("The model produced no plugin files. Please refine the request and retry.");
    }
    Ok(files)
}

/// Write the generated files under `out_dir`, creating nested directories
/// for filenames like `icons/icon.svg`
pub fn write_files(out_dir: &Path, files: &[GeneratedFile]) -> Result<()> {
    for file in files {
        let path = out_dir.join(&file.filename);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, &file.code)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

/// Pack the generated files into one zip archive at `path`
pub fn write_zip(path: &Path, files: &[GeneratedFile]) -> Result<()> {
    let archive = fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut zip = zip::ZipWriter::new(archive);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for file in files {
        zip.start_file(file.filename.as_str(), options)
            .with_context(|| format!("Failed to add {} to the archive", file.filename))?;
        zip.write_all(file.code.as_bytes())
            .with_context(|| format!("Failed to write {} into the archive", file.filename))?;
    }
    zip.finish().context("Failed to finalize the archive")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wordpress_request() -> WordPressPlugin {
        WordPressPlugin {
            name: "My Great Plugin".to_string(),
            description: "Does great things".to_string(),
            version: "1.0.0".to_string(),
            author: "A. Developer".to_string(),
            features: vec!["Admin Menu Page".to_string(), "Shortcode".to_string()],
            fields: vec![SettingsField {
                field_type: FieldType::Text,
                label: "API Key".to_string(),
                name: "api_key".to_string(),
            }],
        }
    }

    #[test]
    fn test_wordpress_prompt_lists_features_and_fields() {
        let prompt = build_wordpress_prompt(&wordpress_request());

        assert!(prompt.contains("**Plugin Name:** My Great Plugin"));
        assert!(prompt.contains("- Admin Menu Page\n- Shortcode"));
        assert!(prompt.contains("**Option Name:** \"my_great_plugin_api_key\""));
        assert!(prompt.contains("Settings API"));
    }

    #[test]
    fn test_wordpress_prompt_omits_admin_details_without_feature() {
        let mut plugin = wordpress_request();
        plugin.features = vec!["Shortcode".to_string()];

        let prompt = build_wordpress_prompt(&plugin);
        assert!(!prompt.contains("Admin Menu Page Details"));
        assert!(!prompt.contains("api_key"));
    }

    #[test]
    fn test_browser_prompt_demands_filename_markers() {
        let prompt = build_browser_prompt(&BrowserExtension {
            name: "Tab Tidy".to_string(),
            description: "Cleans up tabs".to_string(),
            functionality: "Close duplicate tabs on click".to_string(),
        });

        assert!(prompt.contains("Manifest V3"));
        assert!(prompt.contains("// FILENAME: manifest.json"));
        assert!(prompt.contains("<all_urls>"));
    }

    #[test]
    fn test_implicit_filename_only_for_wordpress() {
        let wordpress = PluginRequest::WordPress(wordpress_request());
        assert_eq!(wordpress.implicit_filename().as_deref(), Some("my-great-plugin.php"));

        let browser = PluginRequest::Browser(BrowserExtension {
            name: "Tab Tidy".to_string(),
            description: String::new(),
            functionality: String::new(),
        });
        assert!(browser.implicit_filename().is_none());
    }

    #[test]
    fn test_slugs() {
        assert_eq!(underscore_slug("My Great Plugin"), "my_great_plugin");
        assert_eq!(hyphen_slug("My Great Plugin"), "my-great-plugin");
        assert_eq!(hyphen_slug("single"), "single");
    }

    #[test]
    fn test_settings_field_parsing() {
        let field: SettingsField = "API Key:api_key:text".parse().unwrap();
        assert_eq!(field.label, "API Key");
        assert_eq!(field.name, "api_key");
        assert_eq!(field.field_type, FieldType::Text);

        // Type defaults to text
        let field: SettingsField = "Notes:notes".parse().unwrap();
        assert_eq!(field.field_type, FieldType::Text);

        assert!("only-label".parse::<SettingsField>().is_err());
        assert!("Label:name:dropdown".parse::<SettingsField>().is_err());
    }

    #[test]
    fn test_write_files_creates_nested_directories() {
        let dir = std::env::temp_dir().join(format!("plugin-test-{}", std::process::id()));
        let files = vec![
            GeneratedFile {
                filename: "manifest.json".to_string(),
                code: "{}".to_string(),
            },
            GeneratedFile {
                filename: "icons/icon.svg".to_string(),
                code: "<svg/>".to_string(),
            },
        ];

        write_files(&dir, &files).unwrap();
        assert_eq!(fs::read_to_string(dir.join("manifest.json")).unwrap(), "{}");
        assert_eq!(fs::read_to_string(dir.join("icons/icon.svg")).unwrap(), "<svg/>");

        fs::remove_dir_all(&dir).unwrap();
    }
}
