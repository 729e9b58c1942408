use qrcode::{QrCode, render::svg, types::QrError};

use crate::models::Student;

pub const SVG_CONTENT_TYPE: &str = "image/svg+xml";
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Codes per printed sheet in the mass download.
pub const CODES_PER_SHEET: usize = 8;

const SINGLE_SIZE: u32 = 200;
const SHEET_SIZE: u32 = 120;

/// Renders `data` as a standalone SVG document with a quiet zone.
pub fn qr_svg(data: &str, size: u32) -> Result<String, QrError> {
    let code = QrCode::new(data.as_bytes())?;
    Ok(code
        .render::<svg::Color>()
        .min_dimensions(size, size)
        .quiet_zone(true)
        .build())
}

/// The downloadable QR code for one student.
pub fn student_qr_svg(student: &Student) -> Result<String, QrError> {
    qr_svg(&student.qr_code_data, SINGLE_SIZE)
}

/// `<CODE>_<roll>_<Name_With_Underscores>_QR.svg`
pub fn student_qr_filename(student: &Student) -> String {
    let name = student.name.split_whitespace().collect::<Vec<_>>().join("_");
    format!(
        "{}_{}_{}_QR.svg",
        student.college_code, student.roll_no, name
    )
}

pub fn mass_qr_filename(college_code: &str) -> String {
    format!("{college_code}_All_QR_Codes.html")
}

/// mass_qr_html
///
/// A printable A4 document with `CODES_PER_SHEET` student codes per page, in the order
/// given (callers pass students sorted by roll number).
pub fn mass_qr_html(
    college_name: &str,
    college_code: &str,
    students: &[Student],
) -> Result<String, QrError> {
    let college_name = escape_html(college_name);
    let college_code = escape_html(college_code);

    let mut sheets = String::new();
    for (sheet_index, chunk) in students.chunks(CODES_PER_SHEET).enumerate() {
        let mut items = String::new();
        for student in chunk {
            let svg = qr_svg(&student.qr_code_data, SHEET_SIZE)?;
            items.push_str(&format!(
                r#"<div class="qr-item"><div class="qr-code">{svg}</div><div class="student-info"><div class="student-name">{name}</div><div class="student-details">Roll: {roll}<br>Group: {group}<br>{college}</div></div></div>"#,
                svg = strip_xml_declaration(&svg),
                name = escape_html(&student.name),
                roll = escape_html(&student.roll_no),
                group = escape_html(&student.group_no),
                college = escape_html(&student.college_name),
            ));
        }
        sheets.push_str(&format!(
            r#"<div class="sheet"><div class="header"><h2>{college_name} ({college_code})</h2><p>Student QR Codes - Sheet {n}</p></div><div class="grid">{items}</div></div>"#,
            n = sheet_index + 1,
        ));
    }

    Ok(format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{college_code} QR Codes</title>
<style>
@page {{ size: A4; margin: 20mm; }}
body {{ font-family: Arial, sans-serif; margin: 0; padding: 0; }}
.sheet {{ page-break-after: always; }}
.sheet:last-child {{ page-break-after: avoid; }}
.header {{ text-align: center; margin-bottom: 20px; }}
.grid {{ display: grid; grid-template-columns: repeat(2, 1fr); gap: 20px; }}
.qr-item {{ border: 1px solid #ddd; padding: 15px; text-align: center; border-radius: 8px; break-inside: avoid; }}
.qr-code {{ margin-bottom: 10px; }}
.student-info {{ font-size: 12px; line-height: 1.4; }}
.student-name {{ font-weight: bold; margin-bottom: 5px; }}
.student-details {{ color: #666; }}
</style>
</head>
<body>
{sheets}
</body>
</html>
"#
    ))
}

// Inline SVG inside HTML must not carry its own XML prolog.
fn strip_xml_declaration(svg: &str) -> &str {
    match svg.find("<svg") {
        Some(start) => &svg[start..],
        None => svg,
    }
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
