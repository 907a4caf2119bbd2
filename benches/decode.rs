use criterion::{black_box, criterion_group, criterion_main, Criterion};
use keybridge::midi::DecoderState;

fn bench_decode(c: &mut Criterion) {
    // A realistic burst: alternating presses and releases across the keybed
    let mut note_stream = Vec::with_capacity(3 * 2048);
    for i in 0..1024u32 {
        let key = (i % 88 + 21) as u8;
        note_stream.extend_from_slice(&[0x90, key, 100]);
        note_stream.extend_from_slice(&[0x80, key, 0]);
    }

    c.bench_function("decode_note_stream", |b| {
        b.iter(|| {
            let mut decoder = DecoderState::new();
            black_box(decoder.feed(black_box(&note_stream)))
        })
    });

    // Every third message is a control change the decoder skips
    let mut mixed_stream = Vec::with_capacity(3 * 1024);
    for i in 0..1024u32 {
        match i % 3 {
            0 => mixed_stream.extend_from_slice(&[0x90, 60, 100]),
            1 => mixed_stream.extend_from_slice(&[0xB0, 7, (i % 128) as u8]),
            _ => mixed_stream.extend_from_slice(&[0x80, 60, 0]),
        }
    }

    c.bench_function("decode_mixed_stream", |b| {
        b.iter(|| {
            let mut decoder = DecoderState::new();
            black_box(decoder.feed(black_box(&mixed_stream)))
        })
    });
}

criterion_group!(benches, bench_decode);
criterion_main!(benches);
