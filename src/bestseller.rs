use anyhow::Context as _;
use async_trait::async_trait;
use serde::Deserialize;

use crate::config::AladinConfig;
use crate::model::{BestsellerResult, Book};

pub const MAX_BOOKS: usize = 10;
pub const MAX_SOURCE_URLS: usize = 3;
pub const ALADIN_BESTSELLER_PAGE: &str = "http://www.aladin.co.kr/shop/common/wbest.aspx";
pub const DEFAULT_KEYWORD: &str = "도서";
pub const FALLBACK_NOTE: &str = "Using fallback data due to API error";

const KYOBO_COVER_BASE: &str = "https://contents.kyobobook.co.kr/sih/fit-in/458x0/pdt";

/// Primary bestseller data source. Errors mean "use the fallback set".
#[async_trait]
pub trait BestsellerSource: Send + Sync {
    async fn fetch_primary(&self) -> anyhow::Result<BestsellerResult>;
}

/// Never fails: any primary-source failure is replaced by [`fallback_result`].
pub struct BestsellerProvider {
    source: Box<dyn BestsellerSource>,
}

impl BestsellerProvider {
    pub fn new(source: impl BestsellerSource + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }

    pub async fn fetch(&self) -> BestsellerResult {
        match self.source.fetch_primary().await {
            Ok(result) if !result.books.is_empty() => normalize(result),
            Ok(_) => {
                tracing::warn!("bestseller source returned no books");
                tracing::info!(books = MAX_BOOKS, "using fallback bestseller data");
                fallback_result()
            }
            Err(err) => {
                tracing::warn!(?err, "bestseller source failed");
                tracing::info!(books = MAX_BOOKS, "using fallback bestseller data");
                fallback_result()
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AladinSource {
    client: reqwest::Client,
    config: AladinConfig,
}

impl AladinSource {
    pub fn new(client: reqwest::Client, config: AladinConfig) -> Self {
        Self { client, config }
    }

    fn endpoint(&self) -> String {
        let base_url = self.config.base_url.trim_end_matches('/');
        format!("{base_url}/ItemList.aspx")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AladinResponse {
    #[serde(default)]
    error_code: Option<serde_json::Value>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    item: Vec<AladinItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AladinItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    isbn13: String,
    #[serde(default)]
    isbn: String,
    #[serde(default)]
    cover: String,
    #[serde(default)]
    category_name: String,
}

#[async_trait]
impl BestsellerSource for AladinSource {
    async fn fetch_primary(&self) -> anyhow::Result<BestsellerResult> {
        let Some(ttb_key) = self.config.ttb_key.as_deref() else {
            anyhow::bail!("ALADIN_TTB_KEY is not set");
        };
        let endpoint = self.endpoint();

        tracing::debug!(endpoint = %endpoint, "fetch aladin bestsellers");
        let response = self
            .client
            .get(&endpoint)
            .header(reqwest::header::USER_AGENT, "Mozilla/5.0")
            .query(&[
                ("ttbkey", ttb_key),
                ("QueryType", "Bestseller"),
                ("MaxResults", "20"),
                ("start", "1"),
                ("SearchTarget", "Book"),
                ("output", "js"),
                ("Version", "20131101"),
                ("Cover", "Big"),
            ])
            .send()
            .await
            .with_context(|| format!("GET {endpoint}"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Aladin API request failed: {status}");
        }
        let raw = response.text().await.context("read Aladin response body")?;
        parse_aladin_response(&raw)
    }
}

/// `errorCode` is only meaningful when it is present and not a zero value.
fn is_error_code(code: &serde_json::Value) -> bool {
    match code {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(set) => *set,
        serde_json::Value::Number(n) => n.as_f64() != Some(0.0),
        serde_json::Value::String(s) => !matches!(s.trim(), "" | "0"),
        _ => true,
    }
}

fn parse_aladin_response(raw: &str) -> anyhow::Result<BestsellerResult> {
    // `output=js` bodies sometimes end with a statement terminator.
    let body = raw.trim().trim_end_matches(';');
    let response: AladinResponse = serde_json::from_str(body).context("parse Aladin response")?;

    if let Some(code) = response.error_code.filter(is_error_code) {
        let message = response.error_message.unwrap_or_else(|| code.to_string());
        anyhow::bail!("Aladin API error: {message}");
    }
    if response.item.is_empty() {
        anyhow::bail!("no items returned from Aladin API");
    }

    let books = response
        .item
        .into_iter()
        .take(MAX_BOOKS)
        .enumerate()
        .map(|(index, item)| book_from_item(index, item))
        .collect();

    Ok(BestsellerResult {
        books,
        source_urls: vec![ALADIN_BESTSELLER_PAGE.to_owned()],
        note: None,
    })
}

fn book_from_item(index: usize, item: AladinItem) -> Book {
    let rank = index as u32 + 1;
    let isbn = if item.isbn13.trim().is_empty() {
        item.isbn
    } else {
        item.isbn13
    };
    let description = if item.description.trim().is_empty() {
        format!("{rank}위 베스트셀러")
    } else {
        item.description
    };
    Book {
        cover_description: Some(cover_description(&item.title)),
        keyword: keyword_from_category(&item.category_name),
        title: item.title,
        author: item.author,
        description,
        rank,
        isbn: non_empty(isbn),
        cover_url: non_empty(item.cover),
    }
}

/// Last non-empty `>`-separated segment of a category path.
pub fn keyword_from_category(category: &str) -> String {
    category
        .split('>')
        .map(str::trim)
        .rfind(|segment| !segment.is_empty())
        .unwrap_or(DEFAULT_KEYWORD)
        .to_owned()
}

pub fn cover_description(title: &str) -> String {
    format!("\"{title}\" book cover")
}

/// Kyobo cover URL for an ISBN with at least 10 digits.
pub fn cover_url_from_isbn(isbn: &str) -> Option<String> {
    let digits: String = isbn.chars().filter(char::is_ascii_digit).collect();
    (digits.len() >= 10).then(|| format!("{KYOBO_COVER_BASE}/{digits}.jpg"))
}

fn normalize(mut result: BestsellerResult) -> BestsellerResult {
    result.books.truncate(MAX_BOOKS);
    for book in &mut result.books {
        let has_http_cover = book
            .cover_url
            .as_deref()
            .is_some_and(|url| url.starts_with("http://") || url.starts_with("https://"));
        if !has_http_cover {
            book.cover_url = book.isbn.as_deref().and_then(cover_url_from_isbn);
        }
    }

    let mut seen = std::collections::HashSet::new();
    result.source_urls.retain(|url| seen.insert(url.clone()));
    result.source_urls.truncate(MAX_SOURCE_URLS);
    result
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

// (title, author, description, keyword, isbn, cover)
const FALLBACK_BOOKS: [(&str, &str, &str, &str, &str, &str); MAX_BOOKS] = [
    (
        "이해찬 회고록",
        "이해찬",
        "꿈이 모여 역사가 되다",
        "정치인",
        "9791191438826",
        "https://image.aladin.co.kr/product/30175/15/cover500/k442839798_1.jpg",
    ),
    (
        "눈과 돌멩이",
        "위수정 외",
        "2026년 제49회 이상문학상 작품집",
        "소설",
        "9791130674643",
        "https://image.aladin.co.kr/product/38496/16/cover500/k622135312_1.jpg",
    ),
    (
        "괴테는 모든 것을 말했다",
        "스즈키 유이",
        "제172회 아쿠타가와상 수상작",
        "소설",
        "9791194530701",
        "https://image.aladin.co.kr/product/37676/59/cover500/k212032349_3.jpg",
    ),
    (
        "돈의 방정식",
        "모건 하우젤",
        "돈을 지위와 성공의 기준, 그 이상으로 다루기 위한 21가지 이야기",
        "재테크",
        "9791193904671",
        "https://image.aladin.co.kr/product/38325/60/cover500/k952034340_2.jpg",
    ),
    (
        "떠난 것은 돌아오지 않는다",
        "줄리언 반스",
        "부커상 수상 작가의 마지막 소설",
        "소설",
        "9791130681009",
        "https://image.aladin.co.kr/product/38434/78/cover500/k232135794_2.jpg",
    ),
    (
        "퓨처 셀프",
        "벤저민 하디",
        "미래의 자신과 연결되어 현재를 변화시키는 방법",
        "자기계발",
        "9791140710225",
        "https://image.aladin.co.kr/product/32767/61/cover500/k232937637_1.jpg",
    ),
    (
        "역행자",
        "자청",
        "돈과 시간으로부터 자유로워지는 방법",
        "자기계발",
        "9791168473690",
        "https://image.aladin.co.kr/product/29354/32/cover500/k552835893_1.jpg",
    ),
    (
        "불편한 편의점",
        "김호연",
        "따뜻한 위로를 전하는 감동 소설",
        "소설",
        "9788936434267",
        "https://image.aladin.co.kr/product/27338/6/cover500/k222835565_1.jpg",
    ),
    (
        "트렌드 코리아 2026",
        "김난도",
        "2026년을 이끌 10가지 트렌드 키워드",
        "트렌드",
        "9788959897629",
        "https://image.aladin.co.kr/product/34951/47/cover500/k212935465_1.jpg",
    ),
    (
        "마흔에 읽는 니체",
        "장재형",
        "인생의 전환점에서 읽는 니체 철학",
        "철학",
        "9791156759034",
        "https://image.aladin.co.kr/product/11821/67/cover500/k672434296_1.jpg",
    ),
];

/// The fixed ten-book list served when the primary source is unusable.
pub fn fallback_result() -> BestsellerResult {
    let books = FALLBACK_BOOKS
        .iter()
        .enumerate()
        .map(
            |(index, (title, author, description, keyword, isbn, cover))| Book {
                title: (*title).to_owned(),
                author: (*author).to_owned(),
                description: (*description).to_owned(),
                rank: index as u32 + 1,
                keyword: (*keyword).to_owned(),
                isbn: Some((*isbn).to_owned()),
                cover_url: Some((*cover).to_owned()),
                cover_description: Some(format!("{title} book cover")),
            },
        )
        .collect();

    BestsellerResult {
        books,
        source_urls: vec![ALADIN_BESTSELLER_PAGE.to_owned()],
        note: Some(FALLBACK_NOTE.to_owned()),
    }
}
