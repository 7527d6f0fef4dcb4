//! Prompt text for the language model

/// Instructions for turning page images plus OCR context into markdown
pub const ENHANCEMENT_PROMPT: &str = r#"Transcribe the attached page images into clean, well-structured markdown.

Guidelines:
1. Reproduce every table as a markdown table.
2. Write mathematical expressions in LaTeX ($...$ or $$...$$).
3. Preserve the document's structure: headings, paragraphs, lists.
4. Keep measurements, units and technical specifications exactly as printed.
5. Copy numeric values and calculations digit for digit.
6. Use proper bulleted and numbered list syntax.
7. Respond with the markdown only. No preamble, no ```markdown fences.

Raw text and table layouts produced by an OCR service are attached as
context. The OCR output may contain mistakes: use it as a hint and trust
the images when they disagree."#;

pub fn raw_text_context(raw_text: &str) -> String {
    format!("Raw Text Context (from AWS Textract):\n{}", raw_text)
}

pub fn table_context(tables: &str) -> String {
    format!("Table Data Context (from AWS Textract):\n{}", tables)
}

/// Instructions for mapping scan contents onto template cells
pub fn mapping_prompt(template_text: &str, scan_markdown: &str) -> String {
    format!(
        r##"You map data extracted from a scanned document onto the cells of a Microsoft Excel template.

Inputs:
1. Template outline: one line per populated cell of the template, as
   `ADDRESS: "value"`, with `(merged range: X:Y)` appended for merged cells.
   Use it to understand the layout and choose target cells.
2. Scan contents: markdown transcribed from the scanned document. This is
   the data to write.

Rules:
1. Respect merged cells. A label such as `A4: "JOB #:" (merged range: A4:E4)`
   occupies A4 through E4, so its value belongs in F4, the first cell after
   the merged range.
2. For checkbox rows like "[x] FINAL", write "x" into the cell left of
   "FINAL"; never overwrite the label itself.
3. Leave formula cells alone (they show results such as "#DIV/0!").
4. Only emit values found in the scan contents that are not already
   present in the template.
5. Use numbers for numeric readings and strings for everything else.
6. Include every value that needs inserting; do not stop early.

Answer with a single flat JSON object whose keys are cell addresses and
whose values are the data to write, for example:
{{
    "D4": "205274-101.01.01",
    "D5": "Hilcorp Alaska",
    "BU6": "X",
    "D20": 58.427, "H20": 58.430, "L20": 58.421
}}

Template outline:
------------------------
{template}
------------------------

Scan contents:
------------------------
{scan}
------------------------

Return ONLY the JSON object, without commentary or code fences."##,
        template = template_text,
        scan = scan_markdown
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_prompt_embeds_inputs() {
        let prompt = mapping_prompt("A4: \"JOB #:\" (merged range: A4:E4)", "JOB #: 205274-101");
        assert!(prompt.contains("A4: \"JOB #:\" (merged range: A4:E4)\n------------------------"));
        assert!(prompt.contains("JOB #: 205274-101"));
        assert!(prompt.contains("F4"));
        assert!(prompt.contains("{\n    \"D4\""));
    }

    #[test]
    fn test_mapping_prompt_keeps_formula_rule_and_closing_instruction() {
        let prompt = mapping_prompt("A1: \"x\"", "x");
        assert!(prompt.contains("results such as \"#DIV/0!\")"));
        assert!(prompt.ends_with("without commentary or code fences."));
    }
}
