use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use conjugation_core::{Embed, EmbedField, ReplyPayload};
use crossterm::style::{style, Color, Stylize};
use itertools::Itertools;

const INLINE_FIELDS_PER_ROW: usize = 3;
const MAX_WIDTH: u16 = 80;

/// Transforms the provided reply into a string for display.
pub fn reply_to_string(reply: &ReplyPayload) -> String {
    match reply {
        ReplyPayload::Embed(embed) => embed_to_string(embed),
        ReplyPayload::Content(content) => content.clone(),
    }
}

/// Transforms the provided embed into a string for display.
///
/// Fields that aren't inline get a line each. Runs of inline fields are laid out in tables of up to three columns.
fn embed_to_string(embed: &Embed) -> String {
    let title = style(&embed.title)
        .bold()
        .with(convert_embed_color(embed.color))
        .to_string();

    let mut sections = vec![title];
    let groups = embed.fields.iter().group_by(|field| field.inline);
    for (inline, fields) in &groups {
        let fields = fields.collect::<Vec<_>>();
        if inline {
            sections.extend(
                fields
                    .chunks(INLINE_FIELDS_PER_ROW)
                    .map(inline_fields_to_string),
            );
        } else {
            sections.extend(fields.into_iter().map(field_to_string));
        }
    }

    sections.join("\n")
}

/// Transforms a field into a single line for display.
fn field_to_string(field: &EmbedField) -> String {
    format!("{}: {}", style(&field.name).bold(), field.value)
}

/// Transforms a row of inline fields into a table with the names as the header and the values below them.
fn inline_fields_to_string(fields: &[&EmbedField]) -> String {
    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(MAX_WIDTH)
        .enforce_styling()
        .set_header(
            fields
                .iter()
                .map(|field| Cell::new(&field.name).add_attribute(Attribute::Bold)),
        )
        .add_row(fields.iter().map(|field| Cell::new(&field.value)));

    table.to_string()
}

/// Converts the provided embed color to its corresponding terminal color.
fn convert_embed_color(color: u32) -> Color {
    Color::Rgb {
        r: ((color >> 16) & 0xFF) as u8,
        g: ((color >> 8) & 0xFF) as u8,
        b: (color & 0xFF) as u8,
    }
}
