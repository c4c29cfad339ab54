//! 地图上传：批量校验流水线与表单处理器。

use axum::body::Bytes;
use axum::extract::{Extension, Multipart};
use axum::response::Html;
use std::sync::Arc;
use tracing::debug;

use crate::error::ApiError;
use crate::map_commit::{SlotState, existing_slot_state, replace_and_lock};
use crate::map_id::{CounterError, is_id_in_upload_range, map_file_name, parse_file_map_id};
use crate::maps::MapService;
use crate::messages::{Flash, MessageKey};
use crate::nbt::{FormatError, MapContainer};
use crate::pages;
use crate::sanitize::secure_filename;

/// 地图 `data` 记录中必须存在的字段。
pub const REQUIRED_MAP_FIELDS: [&str; 7] = [
    "dimension",
    "locked",
    "colors",
    "scale",
    "trackingPosition",
    "xCenter",
    "zCenter",
];

const USERNAME_FIELD: &str = "userName";
const MAP_FIELD: &str = "map";

/// 校验流水线所见的上传文件。
pub trait UploadedFile {
    fn filename(&self) -> &str;
    fn size(&self) -> u64;
    fn bytes(&self) -> &[u8];
}

/// 从 multipart 表单中读取的文件。
#[derive(Debug, Clone)]
pub struct FormFile {
    filename: String,
    data: Bytes,
}

impl FormFile {
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
        }
    }
}

impl UploadedFile for FormFile {
    fn filename(&self) -> &str {
        &self.filename
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn bytes(&self) -> &[u8] {
        &self.data
    }
}

/// 在检查任何文件之前就拒绝整批上传的原因。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchRejection {
    UsernameEmpty,
    UsernameWhitespace,
    NoFiles,
    TooManyFiles { count: usize, max: usize },
}

impl BatchRejection {
    pub fn message_key(&self) -> MessageKey {
        match self {
            BatchRejection::UsernameEmpty => MessageKey::MapUploadUsernameEmpty,
            BatchRejection::UsernameWhitespace => MessageKey::MapUploadUsernameWhitespace,
            BatchRejection::NoFiles => MessageKey::MapUploadNoFiles,
            BatchRejection::TooManyFiles { .. } => MessageKey::MapUploadTooManyFiles,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileRejection {
    FilenameInvalid,
    IdOutOfRange,
    FileTooLarge,
    FormatInvalid,
    ExistingMapLocked,
    /// 加锁或提交时的基础设施故障，附带日志用的详情。
    UploadFailure(String),
}

impl FileRejection {
    pub fn message_key(&self) -> MessageKey {
        match self {
            FileRejection::FilenameInvalid => MessageKey::MapUploadFilenameInvalid,
            FileRejection::IdOutOfRange => MessageKey::MapUploadMapIdOutOfRange,
            FileRejection::FileTooLarge => MessageKey::MapUploadFileTooLarge,
            FileRejection::FormatInvalid => MessageKey::MapUploadMapFormatInvalid,
            FileRejection::ExistingMapLocked => MessageKey::MapUploadExistingMapLocked,
            FileRejection::UploadFailure(_) => MessageKey::MapUploadFailure,
        }
    }
}

/// 批次中单个文件的处理结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub filename: String,
    pub result: Result<(), FileRejection>,
}

impl FileReport {
    fn rejected(filename: &str, rejection: FileRejection) -> Self {
        Self {
            filename: filename.to_string(),
            result: Err(rejection),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Rejected(BatchRejection),
    Processed(Vec<FileReport>),
}

/// 地图格式校验失败的原因。
#[derive(Debug)]
pub enum MapFormatIssue {
    Undecodable(FormatError),
    MissingField(&'static str),
}

/// 解码并校验地图必需字段，成功时返回解析后的容器。
pub fn validate_map_format(bytes: &[u8]) -> Result<MapContainer, MapFormatIssue> {
    let container = MapContainer::from_compressed(bytes).map_err(MapFormatIssue::Undecodable)?;
    if let Some(missing) = REQUIRED_MAP_FIELDS
        .iter()
        .find(|field| container.get_field(field).is_none())
    {
        return Err(MapFormatIssue::MissingField(*missing));
    }
    Ok(container)
}

fn check_username(username: Option<&str>) -> Result<(), BatchRejection> {
    match username {
        None | Some("") => Err(BatchRejection::UsernameEmpty),
        Some(name) if name.chars().any(char::is_whitespace) => {
            Err(BatchRejection::UsernameWhitespace)
        }
        Some(_) => Ok(()),
    }
}

impl MapService {
    /// 对整批文件执行全部校验，并提交通过校验的文件。
    ///
    /// 只有计数文件不可读时返回错误，其余问题都以拒绝结果的形式返回。
    pub async fn upload_batch<F: UploadedFile>(
        &self,
        username: Option<&str>,
        files: &[F],
    ) -> Result<BatchOutcome, CounterError> {
        if let Err(rejection) = check_username(username) {
            return Ok(BatchOutcome::Rejected(rejection));
        }
        if files.is_empty() {
            return Ok(BatchOutcome::Rejected(BatchRejection::NoFiles));
        }
        if files.len() > self.config.max_files {
            return Ok(BatchOutcome::Rejected(BatchRejection::TooManyFiles {
                count: files.len(),
                max: self.config.max_files,
            }));
        }

        let last_id = self.last_map_id().await?;
        let mut reports = Vec::with_capacity(files.len());
        for file in files {
            reports.push(self.upload_single(file, last_id).await);
        }
        Ok(BatchOutcome::Processed(reports))
    }

    async fn upload_single<F: UploadedFile>(&self, file: &F, last_id: i64) -> FileReport {
        let original_name = file.filename();
        let Some(map_id) = parse_file_map_id(original_name) else {
            return FileReport::rejected(original_name, FileRejection::FilenameInvalid);
        };
        // 只接受规范文件名，避免同一槽位出现 `map_01500.dat` 之类的别名。
        if map_file_name(map_id) != original_name {
            return FileReport::rejected(original_name, FileRejection::FilenameInvalid);
        }
        if !is_id_in_upload_range(map_id, last_id, self.config.last_allowed_id_range) {
            return FileReport::rejected(original_name, FileRejection::IdOutOfRange);
        }

        let filename = secure_filename(original_name);
        if file.size() > self.config.max_file_size {
            return FileReport::rejected(&filename, FileRejection::FileTooLarge);
        }
        let container = match validate_map_format(file.bytes()) {
            Ok(container) => container,
            Err(MapFormatIssue::Undecodable(err)) => {
                debug!(filename = %filename, error = %err, "map could not be decoded");
                return FileReport::rejected(&filename, FileRejection::FormatInvalid);
            }
            Err(MapFormatIssue::MissingField(field)) => {
                debug!(filename = %filename, field, "map is missing a required field");
                return FileReport::rejected(&filename, FileRejection::FormatInvalid);
            }
        };

        let result = self.lock_and_commit(map_id, &filename, container).await;
        FileReport { filename, result }
    }

    async fn lock_and_commit(
        &self,
        map_id: i64,
        filename: &str,
        container: MapContainer,
    ) -> Result<(), FileRejection> {
        let _guard = self
            .slots
            .lock_slot_with_timeout(map_id, self.config.slot_lock_timeout)
            .await
            .map_err(|_| FileRejection::UploadFailure("map slot busy".into()))?;
        let target = self
            .uploads
            .resolve_path_checked(filename, true)
            .await
            .map_err(|err| FileRejection::UploadFailure(err.to_string()))?;

        match existing_slot_state(&target).await {
            Ok(SlotState::Locked) => return Err(FileRejection::ExistingMapLocked),
            Ok(SlotState::Empty | SlotState::Unlocked) => {}
            Err(err) => {
                return Err(FileRejection::UploadFailure(format!(
                    "existing map unreadable: {err}"
                )));
            }
        }

        replace_and_lock(&target, container)
            .await
            .map_err(|err| FileRejection::UploadFailure(err.to_string()))
    }
}

/// 上传表单的解析结果。
#[derive(Debug, Default)]
pub struct UploadForm {
    pub username: Option<String>,
    pub files: Vec<FormFile>,
}

/// 读取 multipart 表单中的用户名与地图文件。
pub async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(USERNAME_FIELD) => form.username = Some(field.text().await?),
            Some(MAP_FIELD) => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await?;
                // Browsers submit an empty part when no file was picked.
                if filename.is_empty() && data.is_empty() {
                    continue;
                }
                form.files.push(FormFile::new(filename, data));
            }
            _ => {}
        }
    }
    Ok(form)
}

/// 将批处理结果写入提示消息与日志。
pub fn report_outcome(flash: &mut Flash, outcome: &BatchOutcome, username: Option<&str>) {
    match outcome {
        BatchOutcome::Rejected(rejection) => {
            let logged_user = match rejection {
                BatchRejection::UsernameEmpty => None,
                _ => username,
            };
            flash.emit(rejection.message_key(), None, logged_user, None);
        }
        BatchOutcome::Processed(reports) => {
            for report in reports {
                match &report.result {
                    Ok(()) => flash.emit(
                        MessageKey::MapUploadSuccess,
                        Some(&report.filename),
                        username,
                        None,
                    ),
                    Err(rejection) => {
                        let detail = match rejection {
                            FileRejection::UploadFailure(detail) => Some(detail.as_str()),
                            _ => None,
                        };
                        flash.emit(
                            rejection.message_key(),
                            Some(&report.filename),
                            username,
                            detail,
                        );
                    }
                }
            }
        }
    }
}

/// 上传页面：显示当前允许上传的地图 id 范围。
pub async fn upload_page(
    Extension(maps): Extension<Arc<MapService>>,
) -> Result<Html<String>, ApiError> {
    let window = maps.upload_window().await?;
    Ok(Html(pages::map_upload_page(window, &[])))
}

/// 处理地图上传表单。
pub async fn upload_maps(
    Extension(maps): Extension<Arc<MapService>>,
    multipart: Multipart,
) -> Result<Html<String>, ApiError> {
    let form = read_upload_form(multipart).await?;
    let outcome = maps
        .upload_batch(form.username.as_deref(), &form.files)
        .await?;

    let mut flash = Flash::new();
    report_outcome(&mut flash, &outcome, form.username.as_deref());
    let window = maps.upload_window().await?;
    Ok(Html(pages::map_upload_page(window, flash.messages())))
}
