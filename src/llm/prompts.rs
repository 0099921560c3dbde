//! Receipt extraction prompt.

/// Instructions sent ahead of the OCR text.
pub const RECEIPT_PROMPT: &str = r#"You are a receipt extraction assistant.
Analyze the OCR text of the receipt and extract the required details.
Return only JSON strictly matching the schema provided.
If a field is missing in the receipt, infer it where possible (e.g. detect the currency from its symbol).
Ensure dates are normalized to YYYY-MM-DD format.

Schema:
{
  "date": "YYYY-MM-DD",
  "currency": "3-character currency code",
  "vendor_name": "string",
  "receipt_items": [
    {
      "item_name": "string",
      "item_cost": "number"
    }
  ],
  "tax": "number",
  "total": "number"
}"#;

/// Append the recovered text under an `[OCR TEXT]` marker.
///
/// Empty OCR text still yields a prompt; the model decides what to do with it.
pub fn build_receipt_prompt(ocr_text: &str) -> String {
    format!("{}\n\n[OCR TEXT]\n{}", RECEIPT_PROMPT, ocr_text)
}
