//! Распаковка LZF-сжатых строк.
//!
//! Сам алгоритм берётся из крейта `lzf`; здесь только проверка того, что
//! результат имеет ровно заявленный в дампе размер.

use rdbscan_error::{RdbError, RdbResult};

/// Верхняя граница коэффициента распаковки: самая длинная обратная ссылка
/// даёт 264 байта из 3 байт входа.
const MAX_EXPANSION_RATIO: usize = 100;

/// Распаковывает `src` в буфер длиной ровно `dst_len` байт.
///
/// Несовпадение размера или повреждённый поток дают `CorruptContainer`.
pub fn expand(
    src: &[u8],
    dst_len: usize,
) -> RdbResult<Vec<u8>> {
    if dst_len == 0 {
        if src.is_empty() {
            return Ok(Vec::new());
        }
        return Err(lzf_error(format!(
            "{} compressed bytes declared to expand to nothing",
            src.len()
        ))
        .into());
    }

    if dst_len > src.len().saturating_mul(MAX_EXPANSION_RATIO) {
        return Err(lzf_error(format!(
            "{} compressed bytes cannot expand to {dst_len}",
            src.len()
        ))
        .into());
    }

    let out =
        lzf::decompress(src, dst_len).map_err(|e| lzf_error(format!("decompression failed: {e:?}")))?;

    if out.len() != dst_len {
        return Err(lzf_error(format!(
            "expanded to {} bytes, expected {dst_len}",
            out.len()
        ))
        .into());
    }

    Ok(out)
}

fn lzf_error(reason: String) -> RdbError {
    RdbError::CorruptContainer {
        structure: "LZF string".to_string(),
        reason,
        offset: None,
        key: None,
    }
}
