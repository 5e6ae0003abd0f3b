//! Prioritized classification rule table.
//!
//! Rules are pure data owned by the classifier. Declaration order is part
//! of the contract: both the top-priority AND pass and keyword iteration
//! follow it, so `matched_keywords` ordering is deterministic.

/// One keyword-set condition of a rule's top-priority AND pass.
#[derive(Debug, Clone, Copy)]
pub enum MatchCondition {
    /// Every keyword must be present simultaneously.
    All(&'static [&'static str]),
    /// At least one keyword must be present.
    Any(&'static [&'static str]),
}

impl MatchCondition {
    /// Check this condition against the combined text+filename haystack.
    /// Returns the matched keywords (declaration order) on success.
    pub fn matches(&self, haystack: &str) -> Option<Vec<String>> {
        match self {
            MatchCondition::All(keywords) => {
                let matched: Vec<String> = keywords
                    .iter()
                    .filter(|k| haystack.contains(**k))
                    .map(|k| (*k).to_string())
                    .collect();
                (matched.len() == keywords.len()).then_some(matched)
            }
            MatchCondition::Any(keywords) => {
                let matched: Vec<String> = keywords
                    .iter()
                    .filter(|k| haystack.contains(**k))
                    .map(|k| (*k).to_string())
                    .collect();
                (!matched.is_empty()).then_some(matched)
            }
        }
    }
}

/// A single classification rule.
#[derive(Debug, Clone, Copy)]
pub struct ClassificationRule {
    /// Four-digit base code this rule produces.
    pub code: &'static str,
    /// Short label used in debug output.
    pub label: &'static str,
    /// Scoring priority; also orders the AND pass (descending).
    pub priority: u32,
    /// Top-priority AND conditions.
    pub and_conditions: &'static [MatchCondition],
    /// Exact-match keywords (weight: priority × 2).
    pub exact: &'static [&'static str],
    /// Partial-match keywords (weight: priority × 1).
    pub partial: &'static [&'static str],
    /// Presence eliminates the rule unless an AND condition matched.
    pub exclude: &'static [&'static str],
    /// Filename-only keywords (weight: priority × 3).
    pub filename_only: &'static [&'static str],
}

/// The built-in rule set, in declaration order.
pub fn builtin_rules() -> &'static [ClassificationRule] {
    RULES
}

static RULES: &[ClassificationRule] = &[
    // ── 0000番台 国税申告書類 ──────────────────────────────
    ClassificationRule {
        code: "0000",
        label: "納付税額一覧表",
        priority: 140,
        and_conditions: &[
            MatchCondition::All(&["納付税額一覧表", "既納付額"]),
            MatchCondition::All(&["納付税額一覧", "確定税額"]),
        ],
        exact: &["納付税額一覧表"],
        partial: &["納付税額", "税額一覧"],
        exclude: &["受信通知", "納付区分番号通知", "メール詳細"],
        filename_only: &[],
    },
    ClassificationRule {
        code: "0001",
        label: "法人税及び地方法人税申告書",
        priority: 135,
        and_conditions: &[
            MatchCondition::All(&["事業年度分の法人税申告書", "差引確定法人税額"]),
            MatchCondition::All(&["内国法人の確定申告(青色)", "法人税額"]),
            MatchCondition::All(&["控除しきれなかった金額", "課税留保金額"]),
            MatchCondition::All(&["中間申告分の法人税額", "中間申告分の地方法人税額"]),
        ],
        exact: &[
            "法人税及び地方法人税申告書",
            "内国法人の確定申告",
            "内国法人の確定申告(青色)",
            "法人税申告書別表一",
            "申告書第一表",
        ],
        partial: &[
            "法人税申告",
            "内国法人",
            "確定申告",
            "青色申告",
            "事業年度分",
            "税額控除",
        ],
        exclude: &[
            "メール詳細",
            "受信通知",
            "納付区分番号通知",
            "添付資料",
            "イメージ添付",
        ],
        filename_only: &["内国法人", "確定申告", "青色"],
    },
    ClassificationRule {
        code: "0002",
        label: "添付資料_法人税",
        priority: 125,
        and_conditions: &[
            MatchCondition::All(&["添付資料", "法人税申告", "イメージ添付"]),
            MatchCondition::All(&["添付書類", "法人税", "申告書"]),
        ],
        exact: &[
            "法人税 添付資料",
            "添付資料 法人税",
            "イメージ添付書類(法人税申告)",
            "イメージ添付書類 法人税",
            "添付書類 法人税",
        ],
        partial: &["添付資料", "法人税 資料", "イメージ添付", "添付書類"],
        exclude: &[
            "消費税申告",
            "法人消費税",
            "消費税",
            "受信通知",
            "納付区分番号通知",
        ],
        filename_only: &["法人税申告", "法人税", "内国法人"],
    },
    ClassificationRule {
        code: "0003",
        label: "受信通知_法人税",
        priority: 130,
        and_conditions: &[
            MatchCondition::All(&["メール詳細", "種目 法人税及び地方法人税申告書"]),
            MatchCondition::All(&["受付番号", "税目 法人税", "受付日時"]),
            MatchCondition::All(&["提出先", "税務署", "法人税及び地方法人税申告書"]),
            MatchCondition::All(&["送信されたデータを受け付けました", "法人税"]),
        ],
        exact: &["法人税 受信通知", "受信通知 法人税"],
        partial: &["受信通知", "国税電子申告", "メール詳細"],
        exclude: &["消費税申告書", "納付区分番号通知"],
        filename_only: &["受信通知", "法人税"],
    },
    ClassificationRule {
        code: "0004",
        label: "納付情報_法人税",
        priority: 130,
        and_conditions: &[
            MatchCondition::All(&["メール詳細（納付区分番号通知）", "法人税及地方法人税"]),
            MatchCondition::All(&["納付区分番号通知", "税目 法人税及地方法人税"]),
            MatchCondition::All(&["納付先", "税務署", "法人税及地方法人税"]),
            MatchCondition::All(&["納付内容を確認し", "法人税"]),
        ],
        exact: &["法人税 納付情報", "納付情報 法人税", "納付区分番号通知"],
        partial: &["納付情報", "納付書", "国税 納付"],
        exclude: &["消費税及地方消費税", "受信通知"],
        filename_only: &["納付情報", "法人税"],
    },
    // ── 1000番台 都道府県税関連 ────────────────────────────
    ClassificationRule {
        code: "1001",
        label: "都道府県_法人都道府県民税・事業税・特別法人事業税",
        priority: 135,
        and_conditions: &[
            MatchCondition::All(&[
                "法人都道府県民税・事業税・特別法人事業税申告書",
                "年400万円以下",
            ]),
            MatchCondition::All(&["県税事務所", "法人事業税", "特別法人事業税"]),
            MatchCondition::All(&["都税事務所", "道府県民税", "事業税"]),
            MatchCondition::All(&["法人事業税申告書", "都道府県民税"]),
        ],
        exact: &[
            "法人都道府県民税・事業税・特別法人事業税申告書",
            "法人事業税申告書",
            "都道府県民税申告書",
        ],
        partial: &[
            "都道府県民税",
            "法人事業税",
            "特別法人事業税",
            "道府県民税",
            "事業税",
            "県税事務所",
            "都税事務所",
            "年400万円以下",
            "年月日から年月日までの",
        ],
        exclude: &[
            "市町村",
            "市民税",
            "市役所",
            "町役場",
            "村役場",
            "受信通知",
            "納付情報",
        ],
        filename_only: &["県税事務所", "都税事務所"],
    },
    ClassificationRule {
        code: "1003",
        label: "受信通知_都道府県",
        priority: 130,
        and_conditions: &[
            MatchCondition::All(&["申告受付完了通知", "都道府県民税", "事業税"]),
            MatchCondition::All(&["県税事務所", "受信通知", "法人事業税"]),
            MatchCondition::All(&["都税事務所", "受付完了通知", "特別法人事業税"]),
        ],
        exact: &["都道府県 受信通知"],
        partial: &["受信通知", "地方税電子申告"],
        exclude: &["市町村", "市民税", "国税電子申告"],
        filename_only: &["受信通知", "都道府県"],
    },
    ClassificationRule {
        code: "1004",
        label: "納付情報_都道府県",
        priority: 130,
        and_conditions: &[
            MatchCondition::All(&["納付情報発行結果", "法人二税・特別税"]),
            MatchCondition::All(&["地方税共同機構", "法人都道府県民税・事業税"]),
            MatchCondition::All(&["税目:法人二税・特別税", "納付情報が発行され"]),
            MatchCondition::All(&["ペイジー納付情報", "都道府県民税"]),
        ],
        exact: &["都道府県 納付情報", "納付情報発行結果", "地方税共同機構"],
        partial: &["納付情報", "地方税 納付", "法人二税", "特別税"],
        exclude: &["市役所", "町役場", "村役場", "法人市民税", "国税"],
        filename_only: &["納付情報", "都道府県"],
    },
    // ── 2000番台 市町村税関連 ──────────────────────────────
    ClassificationRule {
        code: "2001",
        label: "市町村_法人市民税",
        priority: 135,
        and_conditions: &[
            MatchCondition::All(&["法人市民税申告書", "市役所", "均等割"]),
            MatchCondition::All(&["市町村民税", "法人税割", "申告納付税額"]),
            MatchCondition::All(&["法人市民税", "課税標準総額", "市長"]),
        ],
        exact: &["法人市民税申告書", "市民税申告書"],
        partial: &["法人市民税", "市町村民税", "市役所", "町役場", "村役場"],
        exclude: &[
            "都道府県",
            "事業税",
            "県税事務所",
            "都税事務所",
            "受信通知",
            "納付情報",
        ],
        filename_only: &["市役所", "市民税"],
    },
    ClassificationRule {
        code: "2003",
        label: "受信通知_市町村",
        priority: 140,
        and_conditions: &[
            MatchCondition::All(&["申告受付完了通知", "法人市町村民税"]),
            MatchCondition::All(&["申告受付完了通知", "法人市民税"]),
            MatchCondition::All(&["法人市民税", "市役所", "申告受付完了通知"]),
            MatchCondition::All(&["市長", "法人市民税", "受付完了通知"]),
            MatchCondition::All(&["蒲郡市役所", "申告受付完了通知"]),
            MatchCondition::All(&["福岡市", "法人市民税", "受付番号"]),
        ],
        exact: &["市町村 受信通知", "申告受付完了通知"],
        partial: &["受信通知", "地方税電子申告", "市役所"],
        exclude: &["県税事務所", "都税事務所", "法人事業税", "国税電子申告"],
        filename_only: &["受信通知", "市町村"],
    },
    ClassificationRule {
        code: "2004",
        label: "納付情報_市町村",
        priority: 130,
        and_conditions: &[
            MatchCondition::All(&["納付情報発行結果", "法人住民税"]),
            MatchCondition::All(&["市役所", "納付情報", "法人市民税"]),
            MatchCondition::All(&["地方税共同機構", "法人市町村民税"]),
        ],
        exact: &["市町村 納付情報", "法人住民税 納付情報"],
        partial: &["納付情報", "地方税 納付", "法人住民税"],
        exclude: &["県税事務所", "都税事務所", "法人二税・特別税", "国税"],
        filename_only: &["納付情報", "市町村"],
    },
    // ── 3000番台 消費税関連 ────────────────────────────────
    ClassificationRule {
        code: "3001",
        label: "消費税及び地方消費税申告書",
        priority: 135,
        and_conditions: &[
            MatchCondition::All(&["課税期間分の消費税及び", "基準期間の"]),
            MatchCondition::All(&["消費税及び地方消費税申告(一般・法人)", "課税標準額"]),
            MatchCondition::All(&["現金主義会計の適用", "消費税申告"]),
            MatchCondition::All(&["課税標準額", "消費税及び地方消費税の合計税額"]),
        ],
        exact: &[
            "消費税申告書",
            "消費税及び地方消費税申告書",
            "消費税及び地方消費税申告(一般・法人)",
            "消費税申告(一般・法人)",
            "課税期間分の消費税及び",
            "基準期間の",
            "現金主義会計の適用",
        ],
        partial: &[
            "消費税申告",
            "地方消費税申告",
            "消費税申告書",
            "課税期間分",
            "基準期間",
        ],
        exclude: &[
            "添付資料",
            "イメージ添付",
            "資料",
            "受信通知",
            "納付区分番号通知",
        ],
        filename_only: &["消費税及び地方消費税申告", "消費税申告", "地方消費税申告"],
    },
    ClassificationRule {
        code: "3002",
        label: "添付資料_消費税",
        priority: 125,
        and_conditions: &[
            MatchCondition::All(&["添付資料", "消費税申告", "イメージ添付"]),
            MatchCondition::All(&["添付書類", "法人消費税申告"]),
            MatchCondition::All(&["イメージ添付書類(法人消費税申告)", "添付資料"]),
            MatchCondition::All(&["添付書類送付書", "消費税及び"]),
        ],
        exact: &[
            "消費税 添付資料",
            "添付資料 消費税",
            "イメージ添付書類(法人消費税申告)",
            "イメージ添付書類 消費税",
            "添付書類 消費税",
        ],
        partial: &["添付資料", "消費税 資料", "イメージ添付", "添付書類"],
        exclude: &[
            "消費税及び地方消費税申告",
            "消費税申告書",
            "申告(一般・法人)",
            "法人税申告",
            "内国法人",
            "確定申告",
            "受信通知",
            "納付区分番号通知",
        ],
        filename_only: &["イメージ添付書類", "添付書類", "法人消費税"],
    },
    ClassificationRule {
        code: "3003",
        label: "受信通知_消費税",
        priority: 130,
        and_conditions: &[
            MatchCondition::All(&["メール詳細", "種目 消費税申告書"]),
            MatchCondition::All(&["受付番号", "消費税及び地方消費税", "受付日時"]),
            MatchCondition::All(&["提出先", "税務署", "消費税申告書"]),
            MatchCondition::All(&["送信されたデータを受け付けました", "消費税"]),
        ],
        exact: &["消費税 受信通知", "受信通知 消費税"],
        partial: &["受信通知", "国税電子申告", "メール詳細"],
        exclude: &["法人税及び地方法人税申告書", "納付区分番号通知"],
        filename_only: &["受信通知", "消費税"],
    },
    ClassificationRule {
        code: "3004",
        label: "納付情報_消費税",
        priority: 130,
        and_conditions: &[
            MatchCondition::All(&["メール詳細（納付区分番号通知）", "消費税及地方消費税"]),
            MatchCondition::All(&["納付区分番号通知", "税目 消費税及地方消費税"]),
            MatchCondition::All(&["納付先", "税務署", "消費税及地方消費税"]),
            MatchCondition::All(&["納付内容を確認し", "消費税"]),
        ],
        exact: &[
            "消費税 納付情報",
            "納付情報 消費税",
            "消費税 納付区分番号通知",
        ],
        partial: &["納付情報", "納付書", "納付区分番号通知"],
        exclude: &["法人税及地方法人税", "受信通知"],
        filename_only: &["納付情報", "消費税"],
    },
    // ── 5000番台 会計書類 ──────────────────────────────────
    ClassificationRule {
        code: "5001",
        label: "決算書",
        priority: 9,
        and_conditions: &[],
        exact: &["決算書", "貸借対照表", "損益計算書"],
        partial: &["決算", "B/S", "P/L"],
        exclude: &[],
        filename_only: &[],
    },
    ClassificationRule {
        code: "5002",
        label: "総勘定元帳",
        priority: 15,
        and_conditions: &[MatchCondition::Any(&["総勘定元帳"])],
        exact: &["総勘定元帳"],
        partial: &["総勘定", "元帳"],
        exclude: &["補助元帳", "補助"],
        filename_only: &[],
    },
    ClassificationRule {
        code: "5003",
        label: "補助元帳",
        priority: 9,
        and_conditions: &[],
        exact: &["補助元帳"],
        partial: &["補助元帳", "補助"],
        exclude: &["総勘定"],
        filename_only: &[],
    },
    ClassificationRule {
        code: "5004",
        label: "残高試算表",
        priority: 9,
        and_conditions: &[],
        exact: &["残高試算表", "試算表"],
        partial: &["残高試算", "試算表"],
        exclude: &[],
        filename_only: &[],
    },
    ClassificationRule {
        code: "5005",
        label: "仕訳帳",
        priority: 9,
        and_conditions: &[],
        exact: &["仕訳帳"],
        partial: &["仕訳"],
        exclude: &[],
        filename_only: &[],
    },
    // ── 6000番台 固定資産関連 ──────────────────────────────
    ClassificationRule {
        code: "6001",
        label: "固定資産台帳",
        priority: 9,
        and_conditions: &[],
        exact: &["固定資産台帳"],
        partial: &["固定資産台帳", "資産台帳"],
        exclude: &[],
        filename_only: &[],
    },
    ClassificationRule {
        code: "6002",
        label: "一括償却資産明細表",
        priority: 15,
        and_conditions: &[MatchCondition::Any(&["一括償却資産明細表"])],
        exact: &["一括償却資産明細表"],
        partial: &["一括償却", "償却資産明細"],
        exclude: &["少額"],
        filename_only: &[],
    },
    ClassificationRule {
        code: "6003",
        label: "少額減価償却資産明細表",
        priority: 15,
        and_conditions: &[MatchCondition::Any(&["少額減価償却資産明細表"])],
        exact: &["少額減価償却資産明細表"],
        partial: &["少額減価償却", "少額償却"],
        exclude: &["一括"],
        filename_only: &[],
    },
    // ── 7000番台 税区分関連 ────────────────────────────────
    ClassificationRule {
        code: "7001",
        label: "勘定科目別税区分集計表",
        priority: 10,
        and_conditions: &[],
        exact: &["勘定科目別税区分集計表"],
        partial: &["勘定科目別税区分", "勘定科目別", "科目別税区分"],
        exclude: &[],
        filename_only: &[],
    },
    ClassificationRule {
        code: "7002",
        label: "税区分集計表",
        priority: 9,
        and_conditions: &[],
        exact: &["税区分集計表"],
        partial: &["税区分集計", "区分集計"],
        exclude: &["勘定科目別", "科目別"],
        filename_only: &[],
    },
];
