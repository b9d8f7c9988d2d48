//! Integration tests for the chunked firmware update flow.
//!
//! Chunks enter through the non-blocking upload callback, are written by
//! the loop tick, and the completion response is produced afterwards.

use crate::mock_hw::Harness;

use astrogate::api::channels::UPLOAD_PIECE_LEN;
use astrogate::api::codec::{Request, TOKEN_HEADER};
use astrogate::api::ota::UpdatePhase;
use astrogate::app::service::UploadChunk;
use astrogate::error::UpdateError;

const TOKEN: &str = "fw-token";

fn upload_req() -> Request {
    Request::post("/upload/firmware").header(TOKEN_HEADER, TOKEN)
}

fn chunk<'a>(index: usize, data: &'a [u8], is_final: bool, total: u32) -> UploadChunk<'a> {
    UploadChunk {
        filename: "astropixels.bin",
        index,
        data,
        is_final,
        total,
    }
}

/// Feed `parts` as one upload, ticking after every chunk.
fn upload_all(h: &mut Harness, parts: &[&[u8]]) {
    let total: usize = parts.iter().map(|p| p.len()).sum();
    let mut offset = 0;
    let req = upload_req();
    for (i, part) in parts.iter().enumerate() {
        h.upload(&req, chunk(offset, part, i + 1 == parts.len(), total as u32));
        offset += part.len();
        h.tick();
    }
}

#[test]
fn successful_update_schedules_exactly_one_reboot() {
    let mut h = Harness::with_token(TOKEN);
    h.dev.transport.subscribers = 1;

    let req = upload_req();
    assert!(h.upload(&req, chunk(0, b"abcd", false, 8)).is_none());
    assert!(h.completion().is_none(), "nothing written yet");
    assert!(h.upload(&req, chunk(4, b"efgh", true, 8)).is_none());
    assert!(h.completion().is_none(), "queued, not yet written");

    h.tick();
    assert_eq!(h.svc.context().update.phase(), UpdatePhase::Succeeded);
    assert_eq!(h.dev.flash.image, b"abcdefgh");
    assert!(h.dev.flash.committed);
    assert!(!h.dev.system.mounted, "filesystems released before writing");
    assert_eq!(h.dev.indicator.resets, 1);
    assert_eq!(h.dev.indicator.progress, vec![0.5, 1.0]);

    let ota: Vec<_> = h
        .dev
        .transport
        .of_type("ota")
        .iter()
        .map(|f| f["progress"].as_f64().unwrap())
        .collect();
    assert_eq!(ota, vec![0.5, 1.0]);

    let r = h.completion().expect("settled");
    assert_eq!(r.code(), 200);
    assert_eq!(r.body, "Update OK - Rebooting...");
    assert!(h.completion().is_none(), "answered once");
    assert_eq!(h.svc.context().reboot.requests(), 1);
    assert_eq!(h.dev.system.reboots, 0, "never an immediate reboot");

    h.advance(999);
    assert_eq!(h.dev.system.reboots, 0);
    h.advance(1);
    assert_eq!(h.dev.system.reboots, 1);
    h.advance(10_000);
    assert_eq!(h.dev.system.reboots, 1);
    assert_eq!(h.console().count_matching("Update Success. Rebooting..."), 1);
}

#[test]
fn failed_write_ignores_later_chunks_and_reports_failure() {
    let mut h = Harness::with_token(TOKEN);
    h.dev.flash.fail_after_writes = Some(1);

    upload_all(&mut h, &[&b"good"[..], &b"bad!"[..], &b"more"[..]]);

    assert_eq!(
        h.svc.context().update.phase(),
        UpdatePhase::Failed(UpdateError::WriteFailed)
    );
    assert_eq!(h.dev.flash.image, b"good", "nothing written after the failure");
    assert_eq!(h.dev.flash.aborts, 1);
    assert!(!h.dev.flash.committed);

    let r = h.completion().expect("settled");
    assert_eq!(r.code(), 500);
    assert_eq!(r.body, "Update FAILED");
    assert_eq!(h.dev.indicator.failures, 1);
    assert_eq!(h.console().count_matching("Update aborted"), 1);

    h.advance(60_000);
    assert_eq!(h.dev.system.reboots, 0, "device keeps running the old image");
}

#[test]
fn begin_failure_reports_failure() {
    let mut h = Harness::with_token(TOKEN);
    h.dev.flash.fail_begin = true;
    upload_all(&mut h, &[&b"abcd"[..], &b"efgh"[..]]);
    assert!(h.dev.flash.image.is_empty());
    assert_eq!(h.completion().map(|r| r.code()), Some(500));
}

#[test]
fn finalize_failure_reports_failure() {
    let mut h = Harness::with_token(TOKEN);
    h.dev.flash.fail_finalize = true;
    upload_all(&mut h, &[&b"abcd"[..]]);
    assert_eq!(h.completion().map(|r| r.code()), Some(500));
    assert_eq!(h.console().count_matching("Update FAILED"), 1);
    assert_eq!(h.svc.context().reboot.requests(), 0);
}

#[test]
fn unauthorized_upload_never_touches_flash() {
    let mut h = Harness::with_token(TOKEN);
    let req = Request::post("/upload/firmware").header(TOKEN_HEADER, "wrong");
    assert_eq!(h.upload(&req, chunk(0, b"abcd", false, 8)).map(|r| r.code()), Some(401));
    assert_eq!(h.upload(&req, chunk(4, b"efgh", true, 8)).map(|r| r.code()), Some(401));
    h.tick();

    assert_eq!(h.dev.flash.begins, 0);
    assert!(h.dev.system.mounted);
    assert!(h.svc.context().uploads.is_empty());
    assert!(h.completion().is_none(), "already answered by the chunk callback");
    assert_eq!(h.svc.context().update.phase(), UpdatePhase::Idle);
    assert_eq!(h.console().count_matching("rejected (unauthorized)"), 1);
}

#[test]
fn unauthorized_chunk_cannot_disturb_an_active_upload() {
    let mut h = Harness::with_token(TOKEN);
    let good = upload_req();
    let bad = Request::post("/upload/firmware").header(TOKEN_HEADER, "wrong");

    assert!(h.upload(&good, chunk(0, b"abcd", false, 8)).is_none());
    h.tick();

    let r = h.upload(&bad, UploadChunk { filename: "evil.bin", ..chunk(0, b"XXXX", false, 4) });
    assert_eq!(r.map(|r| r.code()), Some(401));
    let r = h.upload(&bad, chunk(4, b"YYYY", true, 8));
    assert_eq!(r.map(|r| r.code()), Some(401));
    h.tick();
    h.drop_upload(&bad);
    h.tick();
    assert_eq!(h.svc.context().update.phase(), UpdatePhase::Receiving);
    assert!(h.completion().is_none());

    assert!(h.upload(&good, chunk(4, b"efgh", true, 8)).is_none());
    h.tick();
    assert_eq!(h.dev.flash.image, b"abcdefgh");
    assert!(h.dev.flash.committed);
    assert_eq!(h.completion().map(|r| r.code()), Some(200));
}

#[test]
fn multi_piece_upload_across_ticks() {
    let mut h = Harness::with_token(TOKEN);
    let image: Vec<u8> = (0..20_000u32).map(|i| (i * 7) as u8).collect();
    let parts: Vec<&[u8]> = image.chunks(1_436).collect();
    upload_all(&mut h, &parts);

    assert_eq!(h.dev.flash.image, image);
    assert_eq!(h.completion().map(|r| r.code()), Some(200));
    assert_eq!(h.svc.context().update.bytes_written(), 20_000);
}

#[test]
fn oversized_chunk_overflows_queue_and_fails_session() {
    let mut h = Harness::with_token(TOKEN);
    let big = vec![0xAA; UPLOAD_PIECE_LEN * 17];
    h.upload(&upload_req(), chunk(0, &big, true, big.len() as u32));
    assert!(h.completion().is_none());

    h.tick();
    assert_eq!(
        h.svc.context().update.phase(),
        UpdatePhase::Failed(UpdateError::QueueOverflow)
    );
    assert_eq!(h.dev.flash.aborts, 1);
    assert!(!h.dev.flash.committed);
    assert_eq!(h.completion().map(|r| r.code()), Some(500));
}

#[test]
fn second_upload_while_receiving_fails_the_session() {
    let mut h = Harness::with_token(TOKEN);
    let req = upload_req();
    h.upload(&req, chunk(0, b"aaaa", false, 8));
    h.tick();
    let state = h.handle(Request::get("/api/state")).body_json().unwrap();
    assert_eq!(state["otaInProgress"], true);

    h.upload(&req, chunk(0, b"bbbb", false, 8));
    h.tick();
    assert_eq!(
        h.svc.context().update.phase(),
        UpdatePhase::Failed(UpdateError::Conflict)
    );
    assert_eq!(h.dev.flash.aborts, 1);

    h.upload(&req, chunk(4, b"bbbb", true, 8));
    h.tick();
    assert_eq!(h.dev.flash.image, b"aaaa", "interleaved data never written");
    assert!(!h.dev.flash.committed);
    assert_eq!(h.completion().map(|r| r.code()), Some(500));
}

#[test]
fn new_upload_after_failure_can_succeed() {
    let mut h = Harness::with_token(TOKEN);
    h.dev.flash.fail_begin = true;
    upload_all(&mut h, &[&b"abcd"[..]]);
    assert_eq!(h.completion().map(|r| r.code()), Some(500));

    h.dev.flash.fail_begin = false;
    upload_all(&mut h, &[&b"wxyz"[..]]);
    assert_eq!(h.completion().map(|r| r.code()), Some(200));
    assert_eq!(h.dev.flash.image, b"wxyz");
}

#[test]
fn dropped_upload_is_failed_and_a_retry_succeeds() {
    let mut h = Harness::with_token(TOKEN);
    let req = upload_req();
    h.upload(&req, chunk(0, b"abcd", false, 8));
    h.tick();
    h.drop_upload(&req);
    h.tick();

    assert_eq!(
        h.svc.context().update.phase(),
        UpdatePhase::Failed(UpdateError::Abandoned)
    );
    assert_eq!(h.dev.flash.aborts, 1);
    assert!(h.completion().is_none(), "nobody left to answer");
    assert_eq!(h.console().count_matching("client disconnected"), 1);

    upload_all(&mut h, &[&b"wxyz"[..], &b"1234"[..]]);
    assert_eq!(h.completion().map(|r| r.code()), Some(200));
    assert_eq!(h.dev.flash.image, b"wxyz1234");
}

#[test]
fn disconnect_after_success_changes_nothing() {
    let mut h = Harness::with_token(TOKEN);
    upload_all(&mut h, &[&b"abcd"[..]]);
    assert_eq!(h.completion().map(|r| r.code()), Some(200));
    h.drop_upload(&upload_req());
    h.tick();
    assert_eq!(h.svc.context().update.phase(), UpdatePhase::Succeeded);
    assert_eq!(h.dev.flash.aborts, 0);
}

#[test]
fn stalled_upload_times_out_and_a_retry_succeeds() {
    let mut h = Harness::with_token(TOKEN);
    let idle = h.svc.context().config.upload_idle_ms;
    h.upload(&upload_req(), chunk(0, b"abcd", false, 8));
    h.tick();

    h.advance(idle - 1);
    assert_eq!(h.svc.context().update.phase(), UpdatePhase::Receiving);
    h.advance(1);
    assert_eq!(
        h.svc.context().update.phase(),
        UpdatePhase::Failed(UpdateError::Abandoned)
    );
    assert_eq!(h.dev.flash.aborts, 1);
    assert_eq!(h.console().count_matching("upload stalled"), 1);

    upload_all(&mut h, &[&b"wxyz"[..]]);
    assert_eq!(h.completion().map(|r| r.code()), Some(200));
    assert_eq!(h.dev.flash.image, b"wxyz");
}
