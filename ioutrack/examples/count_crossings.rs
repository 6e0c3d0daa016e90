use chrono::Local;
use ioutrack::{
    Bbox, CountingConfig, CrossingCounter, Detection, FrameGeometry, SortTracker, TrackerConfig,
};

fn main() -> ioutrack::Result<()> {
    println!("Counting two cars through the default lines...");

    let mut tracker = SortTracker::new(TrackerConfig::default())?;
    let mut counter = CrossingCounter::new(CountingConfig::default())?;
    let frame = FrameGeometry::new(640, 480);

    for line in &counter.config().lines {
        println!("  line '{}' at row {}", line.name, frame.line_row(line.ratio));
    }

    for i in 0..40 {
        let step = i as f32 * 3.0;
        // One car drives down from the top, the other drives up from below.
        let detections = vec![
            Detection::new(Bbox::new(100.0, 10.0 + step, 160.0, 50.0 + step), 0.9).with_class(2),
            Detection::new(Bbox::new(400.0, 150.0 - step, 460.0, 190.0 - step), 0.8).with_class(2),
        ];

        let tracks = tracker.step(&detections);
        counter.retire(&tracks.retired);
        for event in counter.update(frame, &tracks.confirmed, Local::now()) {
            println!(
                "Frame {:2}: track {} crossed '{}' going {}",
                i, event.track_id, event.line_name, event.direction
            );
        }
    }

    let totals = counter.totals();
    println!("\nUP={} DOWN={} TOTAL={}", totals.up, totals.down, totals.total());
    Ok(())
}
