#![no_main]
use libfuzzer_sys::fuzz_target;
use pefseq::Sequence;

fuzz_target!(|data: &[u8]| {
    // Deserialization of arbitrary bytes must either fail cleanly or produce
    // a sequence whose decode and re-serialization are self-consistent.
    let Ok(seq) = Sequence::deserialize(data) else {
        return;
    };

    let decoded = seq.decode();
    assert_eq!(decoded.len(), seq.len());

    let bytes = seq.serialize();
    let again = Sequence::deserialize(&bytes).expect("re-serialized form must parse");
    assert_eq!(again.decode(), decoded);
});
