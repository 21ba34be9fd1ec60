//! Табличные тесты декодера: заголовки, кодировки строк, числа с плавающей
//! точкой, типы записей и ошибки.

use rdbscan::{
    engine::rdb::{decode_ziplist, read_double, read_string, RdbVersion, SliceCursor},
    RdbError, Session, StatusCode, Value, ValueType,
};
use rstest::rstest;

use generators::*;

fn first_record(data: Vec<u8>) -> Result<rdbscan::Record, rdbscan::StackError> {
    let mut session = Session::from_bytes(data)?;
    session
        .next_record()
        .map(|r| r.expect("dump must contain a record"))
}

fn rdb_error(err: &rdbscan::StackError) -> &RdbError {
    err.downcast_ref::<RdbError>().expect("decoder error")
}

#[rstest]
#[case(b"REDIS0001", 1)]
#[case(b"REDIS0004", 4)]
#[case(b"REDIS0006", 6)]
fn header_accepted(
    #[case] header: &[u8],
    #[case] version: u32,
) {
    assert_eq!(RdbVersion::parse_header(header).unwrap().get(), version);
}

#[rstest]
#[case(b"REDIS0000", StatusCode::UnsupportedVersion)]
#[case(b"REDIS0007", StatusCode::UnsupportedVersion)]
#[case(b"REDIS00a6", StatusCode::UnsupportedVersion)]
#[case(b"RADIS0006", StatusCode::InvalidSignature)]
#[case(b"redis0006", StatusCode::InvalidSignature)]
fn header_rejected(
    #[case] header: &[u8],
    #[case] status: StatusCode,
) {
    let mut data = header.to_vec();
    data.push(0xFF);
    let err = Session::from_bytes(data).unwrap_err();
    assert_eq!(err.status_code(), status);
    assert!(rdb_error(&err).is_header_error());
}

/// Тест проверяет, что версия 7 отклоняется до чтения записей.
#[test]
fn version_seven_rejected_before_records() {
    let data = DumpBuilder::new(7).string(b"k", b"v").finish();
    let err = Session::from_bytes(data).unwrap_err();
    assert!(matches!(
        rdb_error(&err),
        RdbError::UnsupportedVersion { found, .. } if found == "0007"
    ));
}

#[rstest]
#[case(encode_int8(-1), "-1")]
#[case(encode_int8(127), "127")]
#[case(encode_int16(-32768), "-32768")]
#[case(encode_int16(1000), "1000")]
#[case(encode_int32(i32::MIN), "-2147483648")]
#[case(encode_int32(123_456_789), "123456789")]
#[case(encode_string(b"hello"), "hello")]
#[case(encode_string(b""), "")]
fn string_encodings(
    #[case] encoded: Vec<u8>,
    #[case] expected: &str,
) {
    let out = read_string(&mut SliceCursor::new(encoded)).unwrap();
    assert_eq!(out, expected.as_bytes());
}

#[rstest]
#[case(0xC4)]
#[case(0xFF)]
fn unknown_string_encoding(#[case] marker: u8) {
    let err = read_string(&mut SliceCursor::new(vec![marker, 0, 0])).unwrap_err();
    assert!(matches!(
        rdb_error(&err),
        RdbError::UnknownEncoding { encoding, .. } if *encoding == marker & 0x3F
    ));
}

#[test]
fn lzf_string() {
    let text = b"abcabcabcabcabcabcabcabcabcabcabcabcabcabc".to_vec();
    let out = read_string(&mut SliceCursor::new(encode_lzf(&text))).unwrap();
    assert_eq!(out, text);
}

/// Тест проверяет, что несовпадение распакованного размера даёт
/// `CorruptContainer`.
#[test]
fn lzf_size_mismatch() {
    let mut encoded = encode_lzf(&[b'z'; 64]);
    // ulen: 64 -> 65 (2-байтовая форма 0x40 0x40 -> 0x40 0x41)
    let pos = encoded
        .windows(2)
        .position(|w| w == [0x40, 0x40])
        .expect("ulen field");
    encoded[pos + 1] = 0x41;
    let err = read_string(&mut SliceCursor::new(encoded)).unwrap_err();
    assert!(matches!(rdb_error(&err), RdbError::CorruptContainer { .. }));
}

#[rstest]
#[case(vec![253], f64::NAN)]
#[case(vec![254], f64::INFINITY)]
#[case(vec![255], f64::NEG_INFINITY)]
#[case(vec![3, b'3', b'.', b'5'], 3.5)]
#[case(vec![2, b'-', b'7'], -7.0)]
#[case(vec![6, b'1', b'e', b'-', b'1', b'0', b'0'], 1e-100)]
fn doubles(
    #[case] encoded: Vec<u8>,
    #[case] expected: f64,
) {
    let v = read_double(&mut SliceCursor::new(encoded)).unwrap();
    if expected.is_nan() {
        assert!(v.is_nan());
    } else {
        assert_eq!(v, expected);
    }
}

#[test]
fn malformed_double() {
    let err = read_double(&mut SliceCursor::new(vec![3, b'a', b'b', b'c'])).unwrap_err();
    assert!(matches!(
        rdb_error(&err),
        RdbError::MalformedNumber { text, .. } if text == "abc"
    ));
}

#[rstest]
#[case(5)]
#[case(8)]
#[case(14)]
#[case(100)]
#[case(251)]
fn unknown_record_type(#[case] tag: u8) {
    let data = DumpBuilder::new(6).raw(&[tag]).finish();
    let err = first_record(data).unwrap_err();
    assert!(matches!(
        rdb_error(&err),
        RdbError::UnknownRecordType { tag: t, offset: Some(9) } if *t == tag
    ));
}

#[rstest]
#[case(11, "intset")]
#[case(12, "ziplist zset")]
fn unsupported_encodings(
    #[case] tag: u8,
    #[case] name: &str,
) {
    let data = DumpBuilder::new(6).blob(tag, b"key", &[0u8; 12]).finish();
    let err = first_record(data).unwrap_err();
    assert_eq!(err.status_code(), StatusCode::NotImplemented);
    match rdb_error(&err) {
        RdbError::UnsupportedEncoding { value_type, key, .. } => {
            assert_eq!(value_type, name);
            assert_eq!(key.as_deref(), Some("key"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

/// Тест проверяет пример из описания формата: ziplist из числа 7 и строки
/// "abc".
#[test]
fn ziplist_immediate_and_string() {
    let blob = ziplist(&[ZlEntry::Int(7), ZlEntry::Str(b"abc".to_vec())]);
    assert_eq!(
        decode_ziplist(&blob).unwrap(),
        vec![b"7".to_vec(), b"abc".to_vec()]
    );
}

#[rstest]
#[case(10, ValueType::ZiplistList)]
#[case(13, ValueType::ZiplistHash)]
fn ziplist_records(
    #[case] tag: u8,
    #[case] value_type: ValueType,
) {
    let blob = ziplist(&[
        ZlEntry::Str(b"f".to_vec()),
        ZlEntry::Int(-5),
        ZlEntry::Str(b"g".to_vec()),
        ZlEntry::Int(40_000),
    ]);
    let record = first_record(DumpBuilder::new(6).blob(tag, b"z", &blob).finish()).unwrap();
    assert_eq!(record.value_type, value_type);
    assert!(value_type.matches(&record.value));
    match record.value {
        Value::List(items) => assert_eq!(
            items,
            vec![b"f".to_vec(), b"-5".to_vec(), b"g".to_vec(), b"40000".to_vec()]
        ),
        Value::Hash(map) => {
            assert_eq!(map.len(), 2);
            assert_eq!(map[&b"f".to_vec()], b"-5".to_vec());
            assert_eq!(map[&b"g".to_vec()], b"40000".to_vec());
        }
        other => panic!("unexpected value: {other:?}"),
    }
}

#[test]
fn zipmap_record() {
    let blob = zipmap(&[(b"k".to_vec(), b"v".to_vec())], 0);
    let record = first_record(DumpBuilder::new(2).blob(9, b"m", &blob).finish()).unwrap();
    assert_eq!(record.value_type, ValueType::ZipmapHash);
    assert_eq!(record.value.len(), 1);
}

/// Тест проверяет, что ошибка внутри контейнера несёт ключ записи и
/// смещение значения.
#[test]
fn corrupt_ziplist_carries_key() {
    let mut blob = vec![0u8; 8];
    blob.extend_from_slice(&[1, 0, 0x00, 0x00, 0xFF]);
    let err = first_record(DumpBuilder::new(6).blob(10, b"lst", &blob).finish()).unwrap_err();
    match rdb_error(&err) {
        RdbError::CorruptContainer { key, offset, .. } => {
            assert_eq!(key.as_deref(), Some("lst"));
            assert_eq!(*offset, Some(14));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[rstest]
#[case(0, true)]
#[case(63, true)]
#[case(64, false)]
#[case(1000, false)]
fn select_db_range(
    #[case] db: u64,
    #[case] ok: bool,
) {
    let data = DumpBuilder::new(6).select_db(db).string(b"k", b"v").finish();
    let result = first_record(data);
    if ok {
        assert_eq!(result.unwrap().db, db);
    } else {
        let err = result.unwrap_err();
        assert!(matches!(
            rdb_error(&err),
            RdbError::DatabaseOutOfRange { index, max: 63, .. } if *index == db
        ));
    }
}

#[rstest]
#[case(0, true)]
#[case(8, true)]
#[case(1, false)]
#[case(7, false)]
#[case(9, false)]
fn eof_trailing_bytes(
    #[case] trailing: usize,
    #[case] ok: bool,
) {
    let mut data = DumpBuilder::new(6).string(b"k", b"v").finish_without_checksum();
    data.extend(std::iter::repeat(0u8).take(trailing));
    let mut session = Session::from_bytes(data).unwrap();
    assert!(session.next_record().unwrap().is_some());
    let end = session.next_record();
    if ok {
        assert!(end.unwrap().is_none());
    } else {
        let err = end.unwrap_err();
        assert!(matches!(
            rdb_error(&err),
            RdbError::UnexpectedEof { remaining, .. } if *remaining == trailing as u64
        ));
    }
}
