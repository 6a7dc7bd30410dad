//! Archive-level component manifest (`META-INF/MANIFEST.MF`).
//!
//! Only the main section is read: `Name: Value` lines up to the first blank
//! line, where a line starting with a single space continues the previous value.
use crate::kernel::constants;

/// Main attributes of a package's component manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentManifest {
    attributes: Vec<(String, String)>,
}

impl ComponentManifest {
    pub fn new() -> Self {
        Self::default().with_attribute("Manifest-Version", "1.0")
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        let mut attributes: Vec<(String, String)> = Vec::new();
        for (number, line) in content.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                break; // end of the main section
            }
            if let Some(continuation) = line.strip_prefix(' ') {
                match attributes.last_mut() {
                    Some((_, value)) => value.push_str(continuation),
                    None => return Err(format!("line {}: continuation without attribute", number + 1)),
                }
                continue;
            }
            let Some((name, value)) = line.split_once(':') else {
                return Err(format!("line {}: expected 'Name: Value', found '{}'", number + 1, line));
            };
            let name = name.trim();
            if name.is_empty() {
                return Err(format!("line {}: empty attribute name", number + 1));
            }
            attributes.push((name.to_string(), value.trim_start().to_string()));
        }
        Ok(Self { attributes })
    }

    /// Add or replace an attribute
    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        match self.attributes.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.attributes.push((name.to_string(), value.to_string())),
        }
        self
    }

    /// Case-insensitive attribute lookup
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn entry_point(&self) -> Option<&str> {
        self.attribute(constants::ENTRY_POINT_ATTRIBUTE)
    }

    pub fn native_library(&self) -> Option<&str> {
        self.attribute(constants::NATIVE_LIBRARY_ATTRIBUTE)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.attributes {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        }
        out
    }
}
