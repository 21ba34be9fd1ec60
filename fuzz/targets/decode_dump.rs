#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use rdbscan::{Session, SessionState};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    /// Подставить корректный заголовок, чтобы чаще доходить до записей.
    with_header: bool,
    version: u8,
    body: Vec<u8>,
}

fuzz_target!(|input: FuzzInput| {
    let data = if input.with_header {
        let mut data = format!("REDIS{:04}", input.version % 8).into_bytes();
        data.extend_from_slice(&input.body);
        data
    } else {
        input.body
    };

    let Ok(mut session) = Session::from_bytes(data) else {
        return;
    };

    let mut failed = false;
    for item in session.by_ref() {
        match item {
            Ok(record) => assert!(
                record.value_type.matches(&record.value),
                "value does not match its type byte: {record:?}"
            ),
            Err(_) => failed = true,
        }
    }

    // После конца данных или ошибки сессия больше ничего не отдаёт.
    assert!(session.next().is_none());
    if failed {
        assert_eq!(session.state(), SessionState::Failed);
    } else {
        assert_eq!(session.state(), SessionState::Eof);
    }
});
