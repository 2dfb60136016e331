use std::io::Cursor;
use std::thread;
use std::time::{Duration, Instant};

use image::{ImageFormat, Rgba, RgbaImage};
use ingest::{
    decoded_queue, raw_queue, DecodeWorkers, Decoder, DoubleRing, MemoryStorage, ResizeFilter,
    Resolution, UploadPump, WorkerConfig,
};

fn png(color: [u8; 4]) -> Vec<u8> {
    let image = RgbaImage::from_pixel(6, 6, Rgba(color));
    let mut cursor = Cursor::new(Vec::new());
    image.write_to(&mut cursor, ImageFormat::Png).unwrap();
    cursor.into_inner()
}

fn pump_until(pump: &mut UploadPump<MemoryStorage>, expected: usize) -> usize {
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut uploaded = 0;
    while uploaded < expected {
        assert!(Instant::now() < deadline, "timed out waiting for uploads");
        uploaded += pump.pump(0).uploaded;
        if uploaded < expected {
            thread::sleep(Duration::from_millis(1));
        }
    }
    uploaded
}

#[test]
fn three_hundred_payloads_leave_the_newest_256() {
    let resolution = Resolution::new(4, 4);
    let (raw_tx, raw_rx) = raw_queue();
    let (decoded_tx, decoded_rx) = decoded_queue();
    let workers = DecodeWorkers::spawn(
        WorkerConfig {
            workers: 1,
            decoder: Decoder::new(resolution, ResizeFilter::Triangle),
        },
        raw_rx,
        decoded_tx,
    )
    .unwrap();

    let ring = DoubleRing::new(
        MemoryStorage::new(256, resolution),
        MemoryStorage::new(256, resolution),
    );
    let mut pump = UploadPump::new(ring, decoded_rx);
    assert_eq!(pump.capacity(), 256);

    for index in 0..300u32 {
        let color = [(index % 256) as u8, (index / 256) as u8 * 200, 7, 255];
        let sequence = raw_tx.push(png(color)).unwrap();
        assert_eq!(sequence, u64::from(index));
        assert_eq!(pump_until(&mut pump, 1), 1);
    }

    assert_eq!(pump.usage(), 256);
    let front = pump.ring().front();
    let mut live = front.storage().live_sequences();
    live.sort_unstable();
    assert_eq!(live, (44..300).collect::<Vec<u64>>());
    assert!((0..44).all(|evicted| !live.contains(&evicted)));

    let newest_slot = (front.state().write_index + 255) % 256;
    let newest = front.storage().frame(newest_slot).unwrap();
    assert_eq!(newest.sequence, 299);
    let [r, g, b, a] = newest.pixel(0, 0).unwrap();
    assert!(r.abs_diff(43) <= 1 && g.abs_diff(200) <= 1 && b.abs_diff(7) <= 1);
    assert_eq!(a, 255);

    workers.shutdown();
}

#[test]
fn burst_with_budget_drains_over_several_frames() {
    let resolution = Resolution::new(2, 2);
    let (raw_tx, raw_rx) = raw_queue();
    let (decoded_tx, decoded_rx) = decoded_queue();
    let workers = DecodeWorkers::spawn(
        WorkerConfig {
            workers: 1,
            decoder: Decoder::new(resolution, ResizeFilter::Nearest),
        },
        raw_rx,
        decoded_tx,
    )
    .unwrap();
    let ring = DoubleRing::new(
        MemoryStorage::new(8, resolution),
        MemoryStorage::new(8, resolution),
    );
    let mut pump = UploadPump::new(ring, decoded_rx);

    for shade in 0..5u8 {
        raw_tx.push(png([shade, shade, shade, 255])).unwrap();
    }
    let deadline = Instant::now() + Duration::from_secs(10);
    while pump.pending() < 5 {
        assert!(Instant::now() < deadline, "decode did not finish");
        thread::sleep(Duration::from_millis(1));
    }

    let first = pump.pump(2);
    assert_eq!((first.uploaded, first.remaining), (2, 3));
    assert_eq!(pump.usage(), 2);
    let second = pump.pump(2);
    assert_eq!((second.uploaded, second.remaining), (2, 1));
    let third = pump.pump(2);
    assert_eq!((third.uploaded, third.remaining), (1, 0));
    assert_eq!(pump.usage(), 5);
    assert_eq!(
        pump.ring().front().storage().live_sequences(),
        vec![0, 1, 2, 3, 4]
    );

    drop(raw_tx);
    workers.shutdown();
}
