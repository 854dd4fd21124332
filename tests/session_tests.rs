// Integration tests for the capture controller
//
// These tests drive whole sessions against the synthetic microphone with a
// paused tokio clock, so pass lengths and elapsed times are exact.

mod common;

use anyhow::Result;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;

use common::{
    count_errors, count_ready, drain, session_config, tone_input, FlakyDecoder, GatedDecoder,
    SlowTaggedEncoders, RATE,
};
use voice_memo::audio::{AudioBackendConfig, AudioDecoder, SignalInput};
use voice_memo::{
    CaptureController, CaptureError, ChannelObserver, PreviewError, PreviewOutcome,
    RecordingState, SessionError, SessionEvent,
};

fn controller_with(
    input: Arc<SignalInput>,
    decoder: Option<Arc<dyn AudioDecoder>>,
) -> (CaptureController, mpsc::UnboundedReceiver<SessionEvent>) {
    let (observer, events) = ChannelObserver::new();
    let mut builder =
        CaptureController::builder(input, Arc::new(observer)).config(session_config());
    if let Some(decoder) = decoder {
        builder = builder.decoder(decoder);
    }
    (builder.build(), events)
}

fn wav_frames(data: &[u8]) -> Result<u32> {
    Ok(hound::WavReader::new(Cursor::new(data.to_vec()))?.duration())
}

#[tokio::test(start_paused = true)]
async fn test_pause_resume_continuity() -> Result<()> {
    let input = Arc::new(tone_input());
    let (mut controller, mut events) = controller_with(input.clone(), None);

    controller.start().await?;
    sleep(Duration::from_secs(2)).await;
    controller.pause().await?;

    // Time spent paused is not recorded
    sleep(Duration::from_secs(5)).await;
    assert_eq!(controller.elapsed(), Duration::from_secs(2));

    controller.resume().await?;
    sleep(Duration::from_millis(1500)).await;
    assert_eq!(controller.elapsed(), Duration::from_millis(3500));
    controller.pause().await?;

    // The first run may already have been pruned, the last one is tracked
    let outcomes = controller.settle().await;
    assert_eq!(outcomes.last(), Some(&PreviewOutcome::Published(3)));
    assert!(outcomes
        .iter()
        .all(|o| matches!(o, PreviewOutcome::Published(_))));

    let artifact = controller.published().expect("published artifact");
    assert_eq!(artifact.duration_ms, 3500);
    assert_eq!(controller.segments().len(), 2);

    // Merged samples cover both passes, within one input block per pass
    let frames = wav_frames(&artifact.data)? as i64;
    let expected = (3.5 * RATE as f64) as i64;
    assert!((frames - expected).abs() <= 2 * 160, "{} frames", frames);

    let events = drain(&mut events);
    assert_eq!(count_ready(&events), 2);
    assert_eq!(count_errors(&events), 0);

    // Every pass released its microphone
    assert_eq!(input.opened_streams(), 2);
    assert_eq!(input.active_streams(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_delete_mid_recording_discards_everything() -> Result<()> {
    let input = Arc::new(tone_input());
    let (decoder, gate) = GatedDecoder::new();
    let (observer, mut events) = ChannelObserver::new();
    let mut controller = CaptureController::builder(input.clone(), Arc::new(observer))
        .config(session_config())
        .decoder(Arc::new(decoder))
        .encoders(Arc::new(SlowTaggedEncoders))
        .build();

    controller.start().await?;
    sleep(Duration::from_secs(1)).await;
    controller.pause().await?;

    // The preview run for the first pass is now blocked in decode
    controller.resume().await?;
    sleep(Duration::from_millis(500)).await;
    assert!(controller.can_delete());
    controller.delete()?;

    assert_eq!(controller.state(), RecordingState::Idle);
    assert!(controller.segments().is_empty());
    assert_eq!(controller.elapsed(), Duration::ZERO);
    assert!(controller.published().is_none());
    assert!(!controller.can_delete());
    assert_eq!(input.active_streams(), 0);

    gate.send(true)?;
    assert_eq!(controller.settle().await, vec![PreviewOutcome::Superseded(2)]);
    assert!(controller.published().is_none());
    assert_eq!(controller.store().live_count(), 0);

    let events = drain(&mut events);
    assert_eq!(count_ready(&events), 0);
    assert!(events.iter().any(|e| matches!(e, SessionEvent::Deleted)));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_delete_after_stop_releases_artifact() -> Result<()> {
    let input = Arc::new(tone_input());
    let (mut controller, _events) = controller_with(input, None);

    controller.start().await?;
    sleep(Duration::from_millis(800)).await;
    controller.stop().await?;
    controller.settle().await;

    let url = controller.published().expect("published").source_url;
    assert_eq!(controller.state(), RecordingState::Idle);
    assert!(controller.can_delete());

    controller.delete()?;
    assert!(controller.store().resolve(&url).is_none());
    assert!(!controller.can_delete());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_decode_failure_is_isolated_to_its_run() -> Result<()> {
    let input = Arc::new(tone_input());
    let decoder = Arc::new(FlakyDecoder::failing_first(1));
    let (mut controller, mut events) =
        controller_with(input, Some(decoder.clone() as Arc<dyn AudioDecoder>));

    controller.start().await?;
    sleep(Duration::from_secs(1)).await;
    controller.pause().await?;

    match controller.settle().await.as_slice() {
        [PreviewOutcome::Failed(2, PreviewError::Decode { index: 0, .. })] => {}
        other => panic!("unexpected outcomes {:?}", other),
    }
    assert!(controller.published().is_none());
    assert_eq!(controller.state(), RecordingState::Paused);
    assert_eq!(count_errors(&drain(&mut events)), 1);

    // The session carries on and the next run covers both segments
    controller.resume().await?;
    sleep(Duration::from_secs(1)).await;
    controller.pause().await?;

    assert_eq!(controller.settle().await, vec![PreviewOutcome::Published(3)]);
    let artifact = controller.published().expect("published artifact");
    assert_eq!(artifact.duration_ms, 2000);
    assert_eq!(decoder.calls(), 3);
    assert_eq!(count_ready(&drain(&mut events)), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_permission_denied_leaves_session_untouched() -> Result<()> {
    let input = Arc::new(SignalInput::denied(AudioBackendConfig::default()));
    let (mut controller, mut events) = controller_with(input.clone(), None);

    let result = controller.start().await;

    assert!(matches!(
        result,
        Err(SessionError::Capture(CaptureError::PermissionDenied(_)))
    ));
    assert_eq!(controller.state(), RecordingState::Idle);
    assert_eq!(controller.stats().started_at, None);
    assert_eq!(input.opened_streams(), 0);
    assert_eq!(count_errors(&drain(&mut events)), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_device_loss_discards_partial_pass() -> Result<()> {
    let input = Arc::new(tone_input().with_dropout(Duration::from_millis(600)));
    let (mut controller, mut events) = controller_with(input.clone(), None);

    controller.start().await?;
    sleep(Duration::from_millis(400)).await;
    controller.pause().await?;
    controller.settle().await;

    controller.resume().await?;
    sleep(Duration::from_secs(1)).await;
    let result = controller.pause().await;

    assert!(matches!(
        result,
        Err(SessionError::Capture(CaptureError::Device(_)))
    ));
    // Back to where the pass started, with the first segment intact
    assert_eq!(controller.state(), RecordingState::Paused);
    assert_eq!(controller.segments().len(), 1);
    assert_eq!(controller.elapsed(), Duration::from_millis(400));
    assert_eq!(controller.published().expect("first preview").duration_ms, 400);
    assert_eq!(input.active_streams(), 0);

    let events = drain(&mut events);
    assert_eq!(count_ready(&events), 1);
    assert_eq!(count_errors(&events), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_device_loss_is_reported_while_recording() -> Result<()> {
    let input = Arc::new(tone_input().with_dropout(Duration::from_millis(300)));
    let (mut controller, mut events) = controller_with(input.clone(), None);

    controller.start().await?;
    sleep(Duration::from_secs(1)).await;

    // Elapsed stops at the moment the stream went away
    let frozen = controller.elapsed();
    assert!(frozen > Duration::ZERO && frozen <= Duration::from_millis(300));
    sleep(Duration::from_millis(4400)).await;
    assert_eq!(controller.elapsed(), frozen);
    assert_eq!(controller.state(), RecordingState::Recording);

    let reported = drain(&mut events);
    assert_eq!(count_errors(&reported), 1);
    assert!(reported.iter().any(|e| matches!(
        e,
        SessionEvent::Error(SessionError::Capture(CaptureError::Device(_)))
    )));
    assert!(!reported.iter().any(|e| matches!(e, SessionEvent::Elapsed(_))));

    // Deleting afterwards does not report the loss a second time
    controller.delete()?;
    assert_eq!(controller.state(), RecordingState::Idle);
    assert_eq!(input.active_streams(), 0);

    let events = drain(&mut events);
    assert_eq!(count_errors(&events), 0);
    assert!(matches!(events.as_slice(), [SessionEvent::Deleted]));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stop_from_paused_keeps_preview() -> Result<()> {
    let input = Arc::new(tone_input());
    let (mut controller, _events) = controller_with(input, None);

    controller.start().await?;
    sleep(Duration::from_millis(700)).await;
    controller.pause().await?;
    controller.settle().await;
    let url = controller.published().expect("published").source_url;

    controller.stop().await?;

    // No new run, nothing released
    assert!(controller.settle().await.is_empty());
    assert_eq!(controller.state(), RecordingState::Idle);
    assert_eq!(controller.published().expect("kept").source_url, url);
    assert_eq!(controller.elapsed(), Duration::from_millis(700));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_fresh_start_clears_previous_session() -> Result<()> {
    let input = Arc::new(tone_input());
    let (mut controller, _events) = controller_with(input, None);

    controller.start().await?;
    sleep(Duration::from_millis(500)).await;
    controller.stop().await?;
    controller.settle().await;
    let old_url = controller.published().expect("published").source_url;

    controller.start().await?;

    assert!(controller.segments().is_empty());
    assert_eq!(controller.elapsed(), Duration::ZERO);
    assert!(controller.published().is_none());
    assert!(controller.store().resolve(&old_url).is_none());

    sleep(Duration::from_millis(300)).await;
    controller.stop().await?;
    controller.settle().await;
    assert_eq!(controller.published().expect("new preview").duration_ms, 300);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_invalid_commands_are_rejected() -> Result<()> {
    let input = Arc::new(tone_input());
    let (mut controller, _events) = controller_with(input, None);

    assert!(controller.stop().await.is_err());
    assert!(controller.pause().await.is_err());
    assert!(controller.resume().await.is_err());
    assert!(controller.delete().is_err());

    controller.start().await?;
    sleep(Duration::from_millis(300)).await;
    controller.pause().await?;

    // Start while paused would throw the segments away
    assert!(matches!(
        controller.start().await,
        Err(SessionError::InvalidTransition {
            state: RecordingState::Paused,
            ..
        })
    ));
    assert_eq!(controller.segments().len(), 1);
    assert!(controller.pause().await.is_err());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_dropping_controller_releases_microphone() -> Result<()> {
    let input = Arc::new(tone_input());
    let (mut controller, _events) = controller_with(input.clone(), None);

    controller.start().await?;
    sleep(Duration::from_millis(200)).await;
    assert_eq!(input.active_streams(), 1);
    assert!(controller.live_peaks().is_some_and(|peaks| !peaks.is_empty()));

    drop(controller);
    assert_eq!(input.active_streams(), 0);
    Ok(())
}
