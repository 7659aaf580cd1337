/// Splits a streamed code generation response into named files
///
/// The generation prompt asks the model to mark the start of each file with
/// an in-band `// FILENAME: <name>` token. Chunks are appended to one growing
/// buffer and the whole buffer is re-scanned on every push. Quadratic in
/// total response size, which is fine at the sizes these responses reach.

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub filename: String,
    pub code: String,
}

pub struct ResponseSplitter {
    buffer: String,
    marker: Regex,
}

impl ResponseSplitter {
    pub fn new() -> Self {
        ResponseSplitter {
            buffer: String::new(),
            // Non-greedy filename: everything up to the next whitespace
            marker: Regex::new(r"//\s*FILENAME:\s*(\S+)").unwrap(),
        }
    }

    /// Append a streamed chunk to the response buffer
    pub fn push_chunk(&mut self, chunk: &str) {
        self.buffer.push_str(chunk);
    }

    pub fn raw(&self) -> &str {
        &self.buffer
    }

    /// Re-scan the buffer and return the current file list.
    ///
    /// Each marker owns the span from just after itself to just before the
    /// next marker (or the end of the buffer for the last one). When no
    /// markers exist, `implicit_filename` turns the whole buffer into a
    /// single file; with no fallback either, the result is empty.
    pub fn files(&self, implicit_filename: Option<&str>) -> Vec<GeneratedFile> {
        let markers: Vec<(usize, usize, String)> = self
            .marker
            .captures_iter(&self.buffer)
            .map(|cap| {
                let whole = cap.get(0).unwrap();
                (whole.start(), whole.end(), cap[1].to_string())
            })
            .collect();

        if markers.is_empty() {
            return match implicit_filename {
                Some(name) if !self.buffer.is_empty() => vec![GeneratedFile {
                    filename: name.to_string(),
                    code: self.buffer.clone(),
                }],
                _ => Vec::new(),
            };
        }

        let mut files = Vec::with_capacity(markers.len());
        for (i, (_, content_start, filename)) in markers.iter().enumerate() {
            let content_end = if i + 1 < markers.len() {
                markers[i + 1].0
            } else {
                self.buffer.len()
            };
            files.push(GeneratedFile {
                filename: filename.clone(),
                code: self.buffer[*content_start..content_end].trim().to_string(),
            });
        }
        files
    }
}

impl Default for ResponseSplitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_markers_two_files() {
        let mut splitter = ResponseSplitter::new();
        splitter.push_chunk("// FILENAME: manifest.json\n{\"v\": 3}\n");
        splitter.push_chunk("// FILENAME: popup.js\nconsole.log('hi');\n");

        let files = splitter.files(None);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].filename, "manifest.json");
        assert_eq!(files[0].code, "{\"v\": 3}");
        assert_eq!(files[1].filename, "popup.js");
        assert_eq!(files[1].code, "console.log('hi');");
    }

    #[test]
    fn test_marker_split_across_chunks() {
        let mut splitter = ResponseSplitter::new();
        splitter.push_chunk("// FILE");
        assert!(splitter.files(None).is_empty());

        splitter.push_chunk("NAME: a.txt\nhello");
        let files = splitter.files(None);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "a.txt");
        assert_eq!(files[0].code, "hello");
    }

    #[test]
    fn test_last_file_grows_with_stream() {
        let mut splitter = ResponseSplitter::new();
        splitter.push_chunk("// FILENAME: a.txt\nfirst ");
        assert_eq!(splitter.files(None)[0].code, "first");

        splitter.push_chunk("second");
        assert_eq!(splitter.files(None)[0].code, "first second");
    }

    #[test]
    fn test_no_markers_single_file_fallback() {
        let mut splitter = ResponseSplitter::new();
        splitter.push_chunk("<?php\n// plugin code\n");

        let files = splitter.files(Some("my-plugin.php"));
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "my-plugin.php");
        assert_eq!(files[0].code, "<?php\n// plugin code\n");
    }

    #[test]
    fn test_no_markers_no_fallback_is_empty() {
        let mut splitter = ResponseSplitter::new();
        splitter.push_chunk("just prose");
        assert!(splitter.files(None).is_empty());
    }

    #[test]
    fn test_empty_buffer_ignores_fallback() {
        let splitter = ResponseSplitter::new();
        assert!(splitter.files(Some("x.php")).is_empty());
    }

    #[test]
    fn test_marker_spacing_variants() {
        let mut splitter = ResponseSplitter::new();
        splitter.push_chunk("//FILENAME: tight.js\na\n//  FILENAME:   spaced.css\nb");

        let files = splitter.files(None);
        assert_eq!(files[0].filename, "tight.js");
        assert_eq!(files[1].filename, "spaced.css");
    }
}
