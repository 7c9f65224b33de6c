mod common;

use common::{draw_qr, qr_frame, to_rgb};
use rust_qr_live::backend::{BackendChain, DecodeBackend, RqrrBackend, RxingBackend};
use rust_qr_live::models::{BackendKind, LumaPlane};
use rust_qr_live::{Frame, ScanConfig, ScanPipeline};

fn plane(frame: &Frame) -> LumaPlane {
    LumaPlane::new(&frame.luma(), frame.width(), frame.height())
}

#[test]
fn rqrr_locates_code_in_frame_coordinates() {
    let frame = qr_frame("https://example.com/item/42", 240, 240, 40, 60, 4);
    let decoded = RqrrBackend::new().decode(&plane(&frame)).unwrap();

    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].payload, "https://example.com/item/42");
    let center = decoded[0].location.as_ref().unwrap().center();
    assert!(center.x > 40.0 && center.x < 200.0);
    assert!(center.y > 60.0 && center.y < 220.0);
}

#[test]
fn rxing_reads_several_codes_at_once() {
    let mut data = vec![255u8; 400 * 200];
    draw_qr(&mut data, 400, "LEFT", 30, 40, 4);
    draw_qr(&mut data, 400, "RIGHT", 270, 40, 4);
    let frame = Frame::from_luma(400, 200, data).unwrap();

    let mut payloads: Vec<String> = RxingBackend::new()
        .decode(&plane(&frame))
        .unwrap()
        .into_iter()
        .map(|d| d.payload)
        .collect();
    payloads.sort();
    assert_eq!(payloads, vec!["LEFT", "RIGHT"]);
}

#[test]
fn blank_plane_yields_nothing() {
    let frame = Frame::from_luma(120, 120, vec![255; 120 * 120]).unwrap();
    let chain = BackendChain::from_selection(&Default::default());
    for backend in [
        Box::new(RqrrBackend::new()) as Box<dyn DecodeBackend>,
        Box::new(RxingBackend::new()),
    ] {
        let found = backend.decode(&plane(&frame)).unwrap_or_default();
        assert!(found.is_empty(), "{} found a code in a blank frame", backend.name());
    }
    assert_eq!(chain.names(), vec!["rqrr", "rxing"]);
}

#[test]
fn default_pipeline_decodes_colour_frame() {
    let frame = to_rgb(&qr_frame("PIPELINE", 320, 240, 118, 78, 4));
    let mut pipeline = ScanPipeline::from_config(&ScanConfig::default());

    let tick = pipeline.run(&frame).unwrap();
    assert_eq!(tick.frame_size, (320, 240));
    let first = &tick.candidates[0];
    assert_eq!(first.payload, "PIPELINE");
    assert_eq!(first.backend, BackendKind::FastSingle);
    // the centered region is tried first and stops the walk
    assert_eq!(first.region.priority, 0);
    assert_eq!(tick.telemetry.regions_scanned, 1);
}
