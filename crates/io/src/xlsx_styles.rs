//! Shared cell formats for every report workbook.

use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder};

pub const HIGHLIGHT_FILL: u32 = 0xC6EFCE;
pub const HEADER_FILL: u32 = 0xE6E6E6;
pub const SECTION_FILL: u32 = 0xD9E1F2;
pub const TREND_TITLE_FILL: u32 = 0x1F4E78;
pub const BORDER_COLOR: u32 = 0xA0A0A0;
pub const PERCENT_FORMAT: &str = "0.0%";
pub const DATE_FORMAT: &str = "yyyy-mm-dd";

/// Formats used by the dashboard sheets.
pub struct DashboardStyles {
    pub title: Format,
    pub section: Format,
    pub label: Format,
    pub header: Format,
    pub cell: Format,
    pub percent: Format,
    pub percent_winner: Format,
}

fn bordered() -> Format {
    Format::new()
        .set_border(FormatBorder::Thin)
        .set_border_color(Color::RGB(BORDER_COLOR))
        .set_align(FormatAlign::Center)
}

impl DashboardStyles {
    pub fn new() -> Self {
        Self {
            title: Format::new().set_bold().set_font_size(13),
            section: Format::new()
                .set_bold()
                .set_font_size(13)
                .set_background_color(Color::RGB(SECTION_FILL))
                .set_align(FormatAlign::Left),
            label: Format::new().set_bold(),
            header: bordered()
                .set_bold()
                .set_background_color(Color::RGB(HEADER_FILL)),
            cell: bordered(),
            percent: bordered().set_num_format(PERCENT_FORMAT),
            percent_winner: bordered()
                .set_num_format(PERCENT_FORMAT)
                .set_background_color(Color::RGB(HIGHLIGHT_FILL)),
        }
    }
}

impl Default for DashboardStyles {
    fn default() -> Self {
        Self::new()
    }
}

/// Header row of plain data sheets.
pub fn table_header() -> Format {
    Format::new().set_bold()
}

/// Header row of trend sheets.
pub fn trend_header() -> Format {
    Format::new()
        .set_bold()
        .set_background_color(Color::RGB(SECTION_FILL))
}

/// Title banner of the executive trend sheet.
pub fn trend_title() -> Format {
    Format::new()
        .set_bold()
        .set_font_size(12)
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(TREND_TITLE_FILL))
}

pub fn date() -> Format {
    Format::new().set_num_format(DATE_FORMAT)
}
