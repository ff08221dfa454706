// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 按键命令输入 (标准输入, 每行可包含多个按键)

use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use tracing::{debug, info};

use crate::control::Command;

/// 从输入流读取命令直到 EOF / 退出命令 / 接收端关闭, 返回发送的命令数
pub fn read_commands<R: BufRead>(reader: R, tx: &Sender<Command>) -> usize {
    let mut sent = 0;
    for line in reader.lines() {
        let Ok(line) = line else { break };
        for command in Command::parse_line(&line) {
            debug!("⌨️  命令: {:?}", command);
            if tx.send(command).is_err() {
                return sent;
            }
            sent += 1;
            if command == Command::Quit {
                return sent;
            }
        }
    }
    sent
}

/// 启动标准输入读取线程
///
/// 阻塞在 stdin 上无法被打断, 退出时不等待该线程。
pub fn spawn_stdin_reader(tx: Sender<Command>) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("stdin-keys".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            let sent = read_commands(stdin.lock(), &tx);
            info!("⌨️  按键输入结束 ({} 条命令)", sent);
        })
        .context("无法启动按键输入线程")
}
