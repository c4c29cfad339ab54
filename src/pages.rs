//! 服务端渲染的 HTML 页面。

use std::fmt::Write;

use crate::map_id::UploadWindow;
use crate::messages::FlashMessage;

/// 转义 HTML 特殊字符。
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

/// 对 URL 路径段做百分号编码。
pub fn encode_path_segment(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<link rel="stylesheet" href="/static/css/style.css">
</head>
<body>
<nav><a href="/">Home</a> <a href="/map/upload">Upload maps</a> <a href="/map/download">Download maps</a> <a href="/world/download">Download worlds</a></nav>
<main>
<h1>{title}</h1>
{body}
</main>
<script src="/static/scripts/file-upload.js" defer></script>
</body>
</html>
"#,
        title = escape_html(title),
    )
}

fn render_flashes(messages: &[FlashMessage]) -> String {
    if messages.is_empty() {
        return String::new();
    }
    let mut out = String::from("<ul class=\"flashes\">\n");
    for message in messages {
        let _ = write!(
            out,
            r#"<li name="flash_message" class="{}">{}"#,
            message.category.as_str(),
            escape_html(&message.text)
        );
        if let Some(link) = &message.link {
            let _ = write!(
                out,
                r#" <a name="download_link" href="{link}">Download</a>"#,
                link = escape_html(link)
            );
        }
        out.push_str("</li>\n");
    }
    out.push_str("</ul>\n");
    out
}

pub fn index_page() -> String {
    layout(
        "Map portal",
        r#"<ul>
<li><a href="/map/upload">Upload map files</a></li>
<li><a href="/map/download">Download map files</a></li>
<li><a href="/world/download">Download world backups</a></li>
</ul>"#,
    )
}

/// 地图上传页，展示当前允许的 id 范围。
pub fn map_upload_page(window: UploadWindow, messages: &[FlashMessage]) -> String {
    let body = format!(
        r#"{flashes}<p>Map ids from <span id="lower_map_id">{lower}</span> to <span id="upper_map_id">{upper}</span> can be uploaded.</p>
<form method="post" action="/map/upload" enctype="multipart/form-data">
<label for="userName">Username</label>
<input type="text" id="userName" name="userName" required>
<label for="map">Map files</label>
<input type="file" id="map" name="map" accept=".dat" multiple required>
<ul id="selected_files"></ul>
<button type="submit">Upload</button>
</form>
"#,
        flashes = render_flashes(messages),
        lower = window.lower,
        upper = window.upper,
    );
    layout("Upload maps", &body)
}

/// 地图下载页。
pub fn map_download_page(messages: &[FlashMessage]) -> String {
    let body = format!(
        r#"{flashes}<form method="post" action="/map/download">
<label for="mapId">Map id</label>
<input type="text" id="mapId" name="mapId" inputmode="numeric" required>
<button type="submit">Create download link</button>
</form>
"#,
        flashes = render_flashes(messages),
    );
    layout("Download maps", &body)
}

/// 世界存档列表页。
pub fn world_download_page(backups: &[String]) -> String {
    let mut body = String::new();
    if backups.is_empty() {
        body.push_str("<p>No world backups are available yet.</p>\n");
    } else {
        body.push_str("<ul class=\"downloads\">\n");
        for name in backups {
            let _ = writeln!(
                body,
                r#"<li><a name="world_download" href="/world/download/{href}">{label}</a></li>"#,
                href = escape_html(&encode_path_segment(name)),
                label = escape_html(name),
            );
        }
        body.push_str("</ul>\n");
    }
    layout("Download worlds", &body)
}
