//! hOCR text-layer helpers.

use once_cell::sync::Lazy;
use regex::Regex;

static WORD_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<span[^>]*class=['"]ocrx_word['"][^>]*>(.*?)</span>"#).unwrap()
});

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Number of recognised words carrying visible text.
pub fn word_count(hocr: &str) -> usize {
    WORD_SPAN
        .captures_iter(hocr)
        .filter(|c| {
            let inner = c.get(1).map_or("", |m| m.as_str());
            !TAG.replace_all(inner, "").trim().is_empty()
        })
        .count()
}

/// A valid hOCR document for a `width`×`height` page with no words on it.
///
/// Embedding this keeps the page's image in the final document when
/// recognition produced nothing usable.
pub fn blank_page(width: u32, height: u32) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Transitional//EN"
    "http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd">
<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="en" lang="en">
 <head>
  <title></title>
  <meta http-equiv="Content-Type" content="text/html;charset=utf-8" />
  <meta name="ocr-system" content="book-ocr" />
  <meta name="ocr-capabilities" content="ocr_page" />
 </head>
 <body>
  <div class='ocr_page' id='page_1' title='bbox 0 0 {width} {height}'>
  </div>
 </body>
</html>
"#
    )
}
