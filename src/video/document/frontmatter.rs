use crate::video::error::PipelineError;

/// Splits a leading `---` delimited block off `content`.
///
/// Returns the front matter (if present), the body, and the byte offset at
/// which the body starts, so positions found in the body can be mapped back
/// to the whole file.
pub fn split_frontmatter(content: &str) -> Result<(Option<&str>, &str, usize), PipelineError> {
    let first_line_end = content.find('\n').map(|i| i + 1).unwrap_or(content.len());
    if !is_delimiter(&content[..first_line_end]) {
        return Ok((None, content, 0));
    }

    let front_start = first_line_end;
    let mut cursor = front_start;
    let mut line_number = 2;

    while cursor < content.len() {
        let line_end = match content[cursor..].find('\n') {
            Some(offset) => cursor + offset + 1,
            None => content.len(),
        };
        let line = &content[cursor..line_end];

        if is_delimiter(line) {
            let front = &content[front_start..cursor];
            return Ok((Some(front), &content[line_end..], line_end));
        }

        cursor = line_end;
        line_number += 1;
    }

    Err(PipelineError::Parse {
        line: line_number - 1,
        message: "closing front matter delimiter '---' not found".to_string(),
    })
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end() == "---"
}

/// Number of lines consumed by the first `byte_offset` bytes.
pub fn lines_before(content: &str, byte_offset: usize) -> usize {
    content[..byte_offset].matches('\n').count()
}
