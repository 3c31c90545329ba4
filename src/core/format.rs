//! Normalization of the exchange's text exports into CSV bodies

use crate::core::fetch::FetchError;

/// Tabs become commas and carriage returns are dropped.
pub fn tab_to_csv(content: &[u8]) -> Result<String, FetchError> {
    let text = std::str::from_utf8(content)
        .map_err(|e| FetchError::Payload(format!("Export is not valid UTF-8: {e}")))?;
    Ok(text.replace('\t', ",").replace('\r', ""))
}

/// Turns the earnings export into a CSV body.
///
/// The export is a quoted string with escaped tabs and newlines. Its first
/// blank-line-separated block is a preamble; the rows live in the second block.
pub fn earnings_csv(content: &[u8]) -> Result<Vec<u8>, FetchError> {
    let text = std::str::from_utf8(content)
        .map_err(|e| FetchError::Payload(format!("Earnings export is not valid UTF-8: {e}")))?;

    let text = text.trim_start_matches('\u{feff}');
    let text = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text);

    let normalized = text
        .replace("\\t", ",")
        .replace('\t', ",")
        .replace("\\r", "")
        .replace('\r', "")
        .replace("\\n", "\n");

    let rows = normalized.split("\n\n").nth(1).ok_or_else(|| {
        FetchError::Payload("Earnings export has no data block after the preamble".to_string())
    })?;
    if rows.trim().is_empty() {
        return Err(FetchError::Payload(
            "Earnings export has an empty data block".to_string(),
        ));
    }

    Ok(rows.as_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fetch::ErrorKind;

    #[test]
    fn test_earnings_keeps_block_after_preamble() {
        let raw = b"col1\\tcol2\\n\\npreamble line\\n\\nPETR4,32.5\\n";
        let csv = earnings_csv(raw).unwrap();
        assert_eq!(String::from_utf8(csv).unwrap(), "preamble line");
    }

    #[test]
    fn test_earnings_unwraps_quoted_export() {
        let raw = "\u{feff}\"Proventos\\n\\nTckrSymb\\tValor\\nPETR4\\t1,02\\r\\nVALE3\\t2,10\"";
        let csv = earnings_csv(raw.as_bytes()).unwrap();
        assert_eq!(
            String::from_utf8(csv).unwrap(),
            "TckrSymb,Valor\nPETR4,1,02\nVALE3,2,10"
        );
    }

    #[test]
    fn test_earnings_without_delimiter_fails() {
        let err = earnings_csv(b"TckrSymb\\tValor\\nPETR4\\t1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Payload);
        assert!(err.to_string().contains("no data block"));
    }

    #[test]
    fn test_earnings_with_empty_block_fails() {
        let err = earnings_csv(b"preamble\\n\\n").unwrap_err();
        assert!(err.to_string().contains("empty data block"));
    }

    #[test]
    fn test_tab_to_csv() {
        let text = tab_to_csv(b"a\tb\r\n1\t2\r\n").unwrap();
        assert_eq!(text, "a,b\n1,2\n");
    }

    #[test]
    fn test_tab_to_csv_rejects_invalid_utf8() {
        assert!(tab_to_csv(&[0xff, 0xfe, 0x00]).is_err());
    }
}
