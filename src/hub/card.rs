//! Generated region of a dataset card (`README.md`).

/// Opening marker of the generated region.
pub const AUTODOC_BEGIN: &str = "<!-- BEGIN anyload_autodoc -->";
/// Closing marker of the generated region.
pub const AUTODOC_END: &str = "<!-- END anyload_autodoc -->";

/// Replace the generated region of `readme` with `markdown`.
///
/// A leading YAML front-matter block is kept byte for byte. Text outside the
/// markers is left alone; without markers the region is appended.
pub fn update_readme_region(readme: &str, markdown: &str) -> String {
    let (front_matter, body) = split_front_matter(readme);
    let region = format!("{AUTODOC_BEGIN}\n{}\n{AUTODOC_END}", markdown.trim_end());

    let mut out = String::with_capacity(readme.len() + region.len() + 2);
    out.push_str(front_matter);

    if let Some(begin) = body.find(AUTODOC_BEGIN) {
        if let Some(end_offset) = body[begin..].find(AUTODOC_END) {
            let end = begin + end_offset + AUTODOC_END.len();
            out.push_str(&body[..begin]);
            out.push_str(&region);
            out.push_str(&body[end..]);
            return out;
        }
    }

    out.push_str(body);
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    if !body.trim().is_empty() {
        out.push('\n');
    }
    out.push_str(&region);
    out.push('\n');
    out
}

/// Split off a leading `---` ... `---` block, including its closing newline.
fn split_front_matter(readme: &str) -> (&str, &str) {
    let Some(after_open) = readme
        .strip_prefix("---\n")
        .or_else(|| readme.strip_prefix("---\r\n"))
    else {
        return ("", readme);
    };
    let open_len = readme.len() - after_open.len();

    let mut offset = 0;
    for line in after_open.split_inclusive('\n') {
        offset += line.len();
        if line.trim_end() == "---" {
            return readme.split_at(open_len + offset);
        }
    }
    ("", readme)
}
