//! 面向用户的提示消息与对应的结构化日志。

use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Success,
    Error,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Success => "success",
            Category::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Info,
    Warn,
    Error,
}

/// 地图页面可能报告的所有结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKey {
    MapUploadSuccess,
    MapUploadFailure,
    MapUploadUsernameEmpty,
    MapUploadUsernameWhitespace,
    MapUploadNoFiles,
    MapUploadTooManyFiles,
    MapUploadFilenameInvalid,
    MapUploadMapIdOutOfRange,
    MapUploadFileTooLarge,
    MapUploadMapFormatInvalid,
    MapUploadExistingMapLocked,
    MapDownloadLinkCreationSuccess,
    MapDownloadLinkCreationMapIdEmpty,
    MapDownloadLinkCreationMapIdInvalid,
    MapDownloadLinkCreationMapIdOutOfRange,
    MapDownloadLinkCreationFileNotFound,
    MapDownloadSuccess,
    MapDownloadForbidden,
    WorldDownloadSuccess,
}

impl MessageKey {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKey::MapUploadSuccess => "MAP_UPLOAD_SUCCESS",
            MessageKey::MapUploadFailure => "MAP_UPLOAD_FAILURE",
            MessageKey::MapUploadUsernameEmpty => "MAP_UPLOAD_USERNAME_EMPTY",
            MessageKey::MapUploadUsernameWhitespace => "MAP_UPLOAD_USERNAME_WHITESPACE",
            MessageKey::MapUploadNoFiles => "MAP_UPLOAD_NO_FILES",
            MessageKey::MapUploadTooManyFiles => "MAP_UPLOAD_TOO_MANY_FILES",
            MessageKey::MapUploadFilenameInvalid => "MAP_UPLOAD_FILENAME_INVALID",
            MessageKey::MapUploadMapIdOutOfRange => "MAP_UPLOAD_MAP_ID_OUT_OF_RANGE",
            MessageKey::MapUploadFileTooLarge => "MAP_UPLOAD_FILE_TOO_LARGE",
            MessageKey::MapUploadMapFormatInvalid => "MAP_UPLOAD_MAP_FORMAT_INVALID",
            MessageKey::MapUploadExistingMapLocked => "MAP_UPLOAD_EXISTING_MAP_LOCKED",
            MessageKey::MapDownloadLinkCreationSuccess => "MAP_DOWNLOAD_LINK_CREATION_SUCCESS",
            MessageKey::MapDownloadLinkCreationMapIdEmpty => {
                "MAP_DOWNLOAD_LINK_CREATION_MAP_ID_EMPTY"
            }
            MessageKey::MapDownloadLinkCreationMapIdInvalid => {
                "MAP_DOWNLOAD_LINK_CREATION_MAP_ID_INVALID"
            }
            MessageKey::MapDownloadLinkCreationMapIdOutOfRange => {
                "MAP_DOWNLOAD_LINK_CREATION_MAP_ID_OUT_OF_RANGE"
            }
            MessageKey::MapDownloadLinkCreationFileNotFound => {
                "MAP_DOWNLOAD_LINK_CREATION_FILE_NOT_FOUND"
            }
            MessageKey::MapDownloadSuccess => "MAP_DOWNLOAD_SUCCESS",
            MessageKey::MapDownloadForbidden => "MAP_DOWNLOAD_FORBIDDEN",
            MessageKey::WorldDownloadSuccess => "WORLD_DOWNLOAD_SUCCESS",
        }
    }

    /// 展示给用户的提示文本。
    pub fn flash_text(self) -> &'static str {
        match self {
            MessageKey::MapUploadSuccess => "Upload Successful!",
            MessageKey::MapUploadFailure => {
                "Upload Failed! Please contact the admins for assistance."
            }
            MessageKey::MapUploadUsernameEmpty => "Upload Failed! Username must not be empty.",
            MessageKey::MapUploadUsernameWhitespace => {
                "Upload Failed! Username must not contain spaces."
            }
            MessageKey::MapUploadNoFiles => "Upload Failed! No files selected.",
            MessageKey::MapUploadTooManyFiles => {
                "Upload Failed! Too many files were selected at one time."
            }
            MessageKey::MapUploadFilenameInvalid => {
                "Upload Failed! File name must be of the form map_<id>.dat."
            }
            MessageKey::MapUploadMapIdOutOfRange => {
                "Upload Failed! Map ID is outside of the allowed range."
            }
            MessageKey::MapUploadFileTooLarge => {
                "Upload Failed! File size is larger than the allowed maximum."
            }
            MessageKey::MapUploadMapFormatInvalid => {
                "Upload Failed! File is not a valid Minecraft map."
            }
            MessageKey::MapUploadExistingMapLocked => {
                "Upload Failed! A map with this ID is locked on the server. Ask an admin to deploy it first."
            }
            MessageKey::MapDownloadLinkCreationSuccess => "Link creation successful!",
            MessageKey::MapDownloadLinkCreationMapIdEmpty => {
                "Link creation failed! Map ID must not be empty."
            }
            MessageKey::MapDownloadLinkCreationMapIdInvalid => {
                "Link creation failed! Map ID must be a number."
            }
            MessageKey::MapDownloadLinkCreationMapIdOutOfRange => {
                "Link creation failed! Map ID is outside of the allowed range."
            }
            MessageKey::MapDownloadLinkCreationFileNotFound => {
                "Link creation failed! Map does not exist on the server."
            }
            MessageKey::MapDownloadSuccess => "Download started.",
            MessageKey::MapDownloadForbidden => "Download forbidden.",
            MessageKey::WorldDownloadSuccess => "Download started.",
        }
    }

    pub fn category(self) -> Category {
        match self {
            MessageKey::MapUploadSuccess
            | MessageKey::MapDownloadLinkCreationSuccess
            | MessageKey::MapDownloadSuccess
            | MessageKey::WorldDownloadSuccess => Category::Success,
            _ => Category::Error,
        }
    }

    fn level(self) -> Level {
        match self {
            MessageKey::MapUploadFailure => Level::Error,
            _ if self.category() == Category::Success => Level::Info,
            _ => Level::Warn,
        }
    }
}

/// 一条待渲染的提示消息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashMessage {
    pub category: Category,
    pub text: String,
    /// 链接创建成功时附带的下载链接。
    pub link: Option<String>,
}

/// 收集单个请求的提示消息，每条消息记录一次日志。
#[derive(Debug, Default)]
pub struct Flash {
    messages: Vec<FlashMessage>,
}

impl Flash {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一条提示消息并写入日志。
    pub fn emit(
        &mut self,
        key: MessageKey,
        filename: Option<&str>,
        username: Option<&str>,
        detail: Option<&str>,
    ) {
        log_message(key, filename, username, detail);
        let text = match filename {
            Some(name) => format!("{name}: {}", key.flash_text()),
            None => key.flash_text().to_string(),
        };
        self.messages.push(FlashMessage {
            category: key.category(),
            text,
            link: None,
        });
    }

    /// 为最近一条消息附加下载链接。
    pub fn attach_link(&mut self, link: String) {
        if let Some(last) = self.messages.last_mut() {
            last.link = Some(link);
        }
    }

    pub fn messages(&self) -> &[FlashMessage] {
        &self.messages
    }
}

/// 按消息级别输出结构化日志。
pub fn log_message(
    key: MessageKey,
    filename: Option<&str>,
    username: Option<&str>,
    detail: Option<&str>,
) {
    let key_str = key.as_str();
    let filename = filename.unwrap_or("");
    let username = username.unwrap_or("");
    match key.level() {
        Level::Info => info!(key = key_str, filename, username, "map portal event"),
        Level::Warn => warn!(key = key_str, filename, username, "map portal event"),
        Level::Error => error!(
            key = key_str,
            filename,
            username,
            detail = detail.unwrap_or(""),
            "map portal failure"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flash_prefixes_filename() {
        let mut flash = Flash::new();
        flash.emit(
            MessageKey::MapUploadSuccess,
            Some("map_1500.dat"),
            Some("Frumple"),
            None,
        );
        flash.emit(MessageKey::MapUploadUsernameEmpty, None, None, None);

        let messages = flash.messages();
        assert_eq!(messages[0].text, "map_1500.dat: Upload Successful!");
        assert_eq!(messages[0].category, Category::Success);
        assert_eq!(messages[1].text, "Upload Failed! Username must not be empty.");
        assert_eq!(messages[1].category, Category::Error);
    }

    #[test]
    fn failure_logs_at_error_level() {
        assert_eq!(MessageKey::MapUploadFailure.level(), Level::Error);
        assert_eq!(MessageKey::MapUploadExistingMapLocked.level(), Level::Warn);
        assert_eq!(MessageKey::MapDownloadSuccess.level(), Level::Info);
    }
}
