use anyhow::Result;
use deploy::{AgentSession, DeployClient, chunk_text};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::Write;
use std::time::Duration;
use tokio::time::sleep;

// UI関連の設定
const USER_NAME: &str = "User";
const AGENT_NAME: &str = "Agent";
const LOADING_ANIMATION_INTERVAL: u64 = 200;
const LOADING_ANIMATION_CHARACTER: &str = ".";
// アクショングループ呼び出しで応答まで長くかかっても、1行に収まる数で止める
const MAX_LOADING_DOTS: usize = 40;
// 行全体を消去する ANSI エスケープシーケンス
const ERASE_LINE: &str = "\x1b[2K";

/// デプロイ済みエージェントとの対話ループを実行する
///
/// ユーザー入力の受け付け、ローディング表示、ストリーミングレスポンスの表示など、
/// すべてのUI/UX処理を担当する。会話の文脈はセッション ID でエージェント側が保持する。
pub async fn run_chat(client: &DeployClient, session: AgentSession) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    println!(
        "Agent: {} (alias {}), session {}",
        session.agent_id, session.alias_id, session.session_id
    );
    println!("+---------------------------------------------------------+");
    println!("| Product Opportunity Chat. Type 'exit' or 'quit' to stop. |");
    println!("+---------------------------------------------------------+");

    loop {
        let readline = rl.readline(&format!("{} > ", USER_NAME));
        match readline {
            Ok(line) => {
                let input = line.trim();

                // 空入力はスキップ
                if input.is_empty() {
                    continue;
                }

                if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
                    break;
                }

                let _ = rl.add_history_entry(input);

                print!("{} > ", AGENT_NAME);
                std::io::stdout().flush()?;

                let loading_task = tokio::spawn(async {
                    let mut printed = 0;
                    while let Some(dot) = loading_dot(printed) {
                        sleep(Duration::from_millis(LOADING_ANIMATION_INTERVAL)).await;
                        print!("{}", dot);
                        if std::io::stdout().flush().is_err() {
                            break;
                        }
                        printed += 1;
                    }
                });

                match client.send_to_agent(&session, input).await {
                    Ok(output) => {
                        let mut stream = output.completion;
                        let mut loading_stopped = false;

                        loop {
                            let event = match stream.recv().await {
                                Ok(Some(event)) => event,
                                Ok(None) => break,
                                Err(e) => {
                                    loading_task.abort();
                                    loading_stopped = true;
                                    println!("\n[Error] Agent stream failed: {}", e);
                                    break;
                                }
                            };

                            // 最初のチャンクが届いたタイミングでローディングを消す
                            if let Some(text) = chunk_text(&event) {
                                if !loading_stopped {
                                    loading_task.abort();
                                    loading_stopped = true;
                                    clear_loading_animation();
                                }
                                print!("{}", text);
                                std::io::stdout().flush()?;
                            }
                        }

                        if !loading_stopped {
                            loading_task.abort();
                            clear_loading_animation();
                        }

                        println!();
                    }
                    Err(e) => {
                        loading_task.abort();
                        println!("\n[Error] Agent invocation failed: {}", e);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

/// `printed` 個表示済みのとき、次に表示するドット
fn loading_dot(printed: usize) -> Option<&'static str> {
    (printed < MAX_LOADING_DOTS).then_some(LOADING_ANIMATION_CHARACTER)
}

/// ローディングアニメーションをクリアしてカーソルを戻す
fn clear_loading_animation() {
    print!("\r{}{} > ", ERASE_LINE, AGENT_NAME);
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loading_dots_stop_at_limit() {
        let dots: usize = (0..MAX_LOADING_DOTS * 2)
            .filter(|printed| loading_dot(*printed).is_some())
            .count();
        assert_eq!(dots, MAX_LOADING_DOTS, "ドットは上限で止まるべき");
        assert_eq!(loading_dot(0), Some("."));
    }
}
