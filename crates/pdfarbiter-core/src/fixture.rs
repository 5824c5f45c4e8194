//! Minimal PDF writer for backend probes and tests.
//!
//! Produces a well-formed PDF 1.4 file (correct xref offsets) with US Letter
//! pages and Helvetica 10pt text placed at given positions.

/// US Letter, in points.
pub const PAGE_WIDTH: f32 = 612.0;
pub const PAGE_HEIGHT: f32 = 792.0;
pub const FONT_SIZE: f32 = 10.0;

/// A run of text whose top-left corner sits at (`x`, `y`), top-left origin.
#[derive(Debug, Clone, Copy)]
pub struct Placed<'a> {
    pub x: f32,
    pub y: f32,
    pub text: &'a str,
}

pub fn placed(x: f32, y: f32, text: &str) -> Placed<'_> {
    Placed { x, y, text }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_ascii() => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

/// Build a PDF with one page per entry of `pages`.
pub fn text_pdf(pages: &[&[Placed<'_>]]) -> Vec<u8> {
    let mut objects: Vec<String> = Vec::with_capacity(3 + pages.len() * 2);
    let kids: Vec<String> = (0..pages.len())
        .map(|i| format!("{} 0 R", 4 + 2 * i))
        .collect();

    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        pages.len()
    ));
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string());

    for (i, runs) in pages.iter().enumerate() {
        let content_id = 5 + 2 * i;
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {content_id} 0 R >>"
        ));

        let mut stream = String::new();
        for run in runs.iter() {
            let baseline = PAGE_HEIGHT - run.y - FONT_SIZE;
            stream.push_str(&format!(
                "BT /F1 {FONT_SIZE} Tf {:.2} {:.2} Td ({}) Tj ET\n",
                run.x,
                baseline,
                escape(run.text)
            ));
        }
        objects.push(format!(
            "<< /Length {} >>\nstream\n{stream}endstream",
            stream.len()
        ));
    }

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
    }

    let xref = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
            objects.len() + 1
        )
        .as_bytes(),
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xref_offsets_point_at_objects() {
        let pdf = text_pdf(&[&[placed(72.0, 72.0, "Hello (world)")]]);
        let text = String::from_utf8(pdf.clone()).unwrap();
        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.contains("(Hello \\(world\\)) Tj"));

        let xref_pos = text.find("xref\n").unwrap();
        let entries: Vec<usize> = text[xref_pos..]
            .lines()
            .skip(3)
            .take_while(|l| l.ends_with(" n "))
            .map(|l| l[..10].parse().unwrap())
            .collect();
        assert_eq!(entries.len(), 5);
        for (i, offset) in entries.iter().enumerate() {
            assert!(text[*offset..].starts_with(&format!("{} 0 obj", i + 1)));
        }
    }

    #[test]
    fn test_page_count_in_tree() {
        let pdf = String::from_utf8(text_pdf(&[&[], &[]])).unwrap();
        assert!(pdf.contains("/Kids [4 0 R 6 0 R] /Count 2"));
    }
}
