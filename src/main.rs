use anyhow::{Context, Result};
use tracing::info;

use pose_match::config::Config;
use pose_match::frame_loop::{FrameLoop, ReplayFrames};
use pose_match::logging;
use pose_match::pose::ReplayDetector;
use pose_match::session::GameSession;

const CONFIG_PATH: &str = "config.toml";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = logging::with_startup_logging(|| Config::load_or_default(CONFIG_PATH));
    logging::init(&config.app.log_level);

    // 引数があれば録画ファイルのパスとして使う
    let replay_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config.detector.replay_path.clone());

    println!("Pose Match ({})", env!("GIT_VERSION"));
    println!("Replay: {}", replay_path);
    println!(
        "Players: {}  Difficulty: {}  Similarity: {}",
        config.game.player_count,
        config.game.difficulty.as_str(),
        config.game.similarity.name()
    );
    println!();

    let detector = ReplayDetector::open(&replay_path, config.detector.frame_width)
        .with_context(|| format!("failed to load replay {}", replay_path))?;
    info!(frames = detector.frame_count(), "replay loaded");

    let source = ReplayFrames::new(detector.frame_count(), detector.frame_width());
    let session = GameSession::new(&config);
    let mut frame_loop = FrameLoop::new(source, detector, session, &config);

    let stats = frame_loop
        .run(|report| {
            for player in report.players.iter().filter(|p| p.awarded) {
                println!(
                    "frame {:>5}  P{} matched {} (score {})",
                    report.frame,
                    player.slot + 1,
                    report.target_id.as_deref().unwrap_or("-"),
                    player.score
                );
            }
        })
        .await;

    println!();
    println!("=== Scoreboard ===");
    for (i, score) in frame_loop.session().scores().iter().enumerate() {
        println!("  P{}: {}", i + 1, score);
    }
    println!(
        "frames: {} processed, {} skipped",
        stats.processed, stats.skipped
    );
    Ok(())
}
