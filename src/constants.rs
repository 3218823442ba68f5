pub mod scan {

    /// Hop bound for pointer-chain discovery (Sleeper previous_league_id,
    /// Yahoo renew/renewed). Guards against cyclic provider data.
    pub const MAX_CHAIN_HOPS: usize = 25;

    /// Earliest season probed by fixed-range providers.
    pub const ESPN_FIRST_SEASON: i32 = 2004;

    pub const FLEAFLICKER_FIRST_SEASON: i32 = 2005;

    /// Hard upper bound on sequential week fetches within one season.
    pub const MAX_WEEKS: i32 = 25;
}

pub mod yahoo {

    /// NFL game ids by season, used when game enumeration fails for the
    /// authenticated user. Yahoo assigns a fresh game key every year.
    pub const NFL_GAME_IDS: &[(i32, i32)] = &[
        (2004, 101),
        (2005, 124),
        (2006, 153),
        (2007, 175),
        (2008, 199),
        (2009, 222),
        (2010, 242),
        (2011, 257),
        (2012, 273),
        (2013, 314),
        (2014, 331),
        (2015, 348),
        (2016, 359),
        (2017, 371),
        (2018, 380),
        (2019, 390),
        (2020, 399),
        (2021, 406),
        (2022, 414),
        (2023, 423),
        (2024, 449),
    ];
}

pub mod health {

    /// Expected regular+postseason game counts per era.
    pub const GAMES_MODERN: (i32, i32) = (13, 17); // 2021 onward
    pub const GAMES_CLASSIC: (i32, i32) = (12, 16); // 2001-2020
    pub const GAMES_EARLY: (i32, i32) = (10, 16); // pre-2001

    pub const MODERN_ERA_START: i32 = 2021;
    pub const CLASSIC_ERA_START: i32 = 2001;

    /// Minimum scored teams required before the points-outlier check runs.
    pub const OUTLIER_MIN_TEAMS: usize = 4;

    pub const OUTLIER_SIGMA: f64 = 3.0;

    /// Allowed drift from the modal team count before flagging.
    pub const TEAM_COUNT_TOLERANCE: i32 = 2;

    pub const PENALTY_HIGH: i32 = 30;
    pub const PENALTY_MEDIUM: i32 = 15;
    pub const PENALTY_LOW: i32 = 5;

    pub const STATUS_GREEN_MIN: i32 = 80;
    pub const STATUS_YELLOW_MIN: i32 = 50;

    pub const RECURRING_HEAVY_RATIO: f64 = 0.8;
    pub const RECURRING_LIGHT_RATIO: f64 = 0.5;
    pub const RECURRING_HEAVY_PENALTY: i32 = 15;
    pub const RECURRING_LIGHT_PENALTY: i32 = 10;
    pub const CROSS_SEASON_PENALTY: i32 = 3;

    /// Cross-season heuristics.
    pub const ALIAS_MIN_TOTAL_SEASONS: usize = 2;
    pub const SPARSE_OWNER_MIN_SEASONS: usize = 5;
    pub const SPARSE_OWNER_GAMES_PER_SEASON: i32 = 10;
}

pub mod repair {

    /// Seasons with fewer expected teams than this are never auto-repaired.
    pub const MIN_EXPECTED_TEAMS: i32 = 4;
}

pub mod progress {

    pub const AFTER_DISCOVERY: i32 = 10;

    pub const SEASON_LOOP_SPAN: i32 = 80;
}
