#![no_main]

use libfuzzer_sys::fuzz_target;

use rdbscan::engine::rdb::{decode_ziplist, decode_ziplist_hash, decode_zipmap};

fuzz_target!(|blob: &[u8]| {
    // Ни один декодер не должен паниковать.
    let list = decode_ziplist(blob);
    let hash = decode_ziplist_hash(blob);
    let _ = decode_zipmap(blob);

    if let (Ok(list), Ok(hash)) = (list, hash) {
        assert!(hash.len() <= list.len() / 2);
    }
});
