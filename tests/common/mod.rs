#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use music_trends::reddit::RawComment;
use music_trends::types::Post;
use music_trends::PipelineConfig;

pub fn post(id: &str, subreddit: &str, author: &str, title: &str, score: i64, num_comments: u64) -> Post {
    Post {
        id: id.to_string(),
        subreddit: subreddit.to_string(),
        author: author.to_string(),
        title: title.to_string(),
        raw_text: String::new(),
        cleaned_text: None,
        score,
        num_comments,
        created_at: "2024-05-01T12:00:00Z".to_string(),
        url: format!("https://example.com/{id}"),
        permalink: format!("/r/{subreddit}/comments/{id}/"),
        detected_song: music_trends::pattern::Pattern::extract_song(title),
        detected_artist: music_trends::pattern::Pattern::extract_artist(title),
        trend_keywords: None,
        engagement_score: None,
        engagement_label: None,
    }
}

pub fn comment(author: &str, body: &str) -> RawComment {
    RawComment {
        author: author.to_string(),
        body: body.to_string(),
    }
}

/// Offline configuration writing below `dir`, with small models.
pub fn test_config(dir: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default().with_output_dir(dir);
    config.fetch.request_delay = Duration::ZERO;
    config.model.n_trees = 20;
    config.graph.top_k = 5;
    config
}

const BODIES: [&str; 4] = [
    "This is an amazing song, I love it",
    "Honestly kind of boring and a terrible mix",
    "It is a song",
    "Great vocals, beautiful production!",
];

/// Thirty song posts over three subreddits with a spread of engagement,
/// plus comments from a small pool of users.
pub fn corpus() -> (Vec<Post>, HashMap<String, Vec<RawComment>>) {
    let subreddits = ["Music", "PopHeads", "indieheads"];
    let users = ["ana", "ben", "cleo", "dev", "eli", "fay"];
    let mut posts = Vec::new();
    let mut fetched = HashMap::new();

    for i in 0..30usize {
        let (score, comments) = match i % 3 {
            0 => (700 + i as i64, 150 + i as u64),
            1 => (150 + i as i64, 40),
            _ => (2 + (i % 5) as i64, 1),
        };
        let id = format!("p{i:02}");
        let title = format!("\"Song {i}\" by Artist {}", i % 4);
        posts.push(post(&id, subreddits[i % 3], users[i % users.len()], &title, score, comments));

        if i % 7 != 6 {
            let thread: Vec<RawComment> = (0..3)
                .map(|k| comment(users[(i + k + 1) % users.len()], BODIES[(i + k) % BODIES.len()]))
                .collect();
            fetched.insert(id, thread);
        }
    }
    (posts, fetched)
}

/// Answer HTTP requests on a local port with canned JSON.
///
/// The first route whose pattern occurs in the request target wins; a
/// request matching no route gets a 500. Returns the base URL.
pub async fn serve(routes: Vec<(&'static str, String)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let routes = Arc::new(routes);
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let routes = Arc::clone(&routes);
            tokio::spawn(async move {
                let mut buf = vec![0u8; 16 * 1024];
                let mut read = 0;
                while read < buf.len() {
                    match socket.read(&mut buf[read..]).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => read += n,
                    }
                    if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                let request = String::from_utf8_lossy(&buf[..read]).to_string();
                let target = request.split_whitespace().nth(1).unwrap_or("/");
                let (status, body) = match routes.iter().find(|(pattern, _)| target.contains(pattern)) {
                    Some((_, body)) => ("200 OK", body.clone()),
                    None => ("500 Internal Server Error", "{}".to_string()),
                };
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{addr}")
}
