use criterion::{Criterion, black_box, criterion_group, criterion_main};
use trak_hardware::rtu::{Request, decode_response};

const MODBUS_CRC: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_MODBUS);

fn register_reply(count: u16) -> Vec<u8> {
    let mut body = vec![0x01, 0x03, (count * 2) as u8];
    for i in 0..count {
        body.extend_from_slice(&(i.wrapping_mul(257)).to_be_bytes());
    }
    let crc = MODBUS_CRC.checksum(&body);
    body.extend_from_slice(&crc.to_le_bytes());
    body
}

fn bench_rtu(c: &mut Criterion) {
    let frame = register_reply(2);
    let req = Request::ReadHoldingRegisters {
        address: 54,
        count: 2,
    };

    c.bench_function("encode_read_request", |b| {
        b.iter(|| black_box(req).encode(black_box(1)))
    });

    c.bench_function("decode_force_reply", |b| {
        b.iter(|| decode_response(black_box(&req), 1, black_box(&frame)))
    });
}

criterion_group!(benches, bench_rtu);
criterion_main!(benches);
