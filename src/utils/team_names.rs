use crate::models::Sport;
use std::collections::HashMap;
use std::sync::OnceLock;

/// (provider spelling, canonical name)
type AliasTable = &'static [(&'static str, &'static str)];

const NHL_ALIASES: AliasTable = &[
    ("ANA", "Anaheim Ducks"),
    ("BOS", "Boston Bruins"),
    ("BUF", "Buffalo Sabres"),
    ("CGY", "Calgary Flames"),
    ("CAR", "Carolina Hurricanes"),
    ("CHI", "Chicago Blackhawks"),
    ("COL", "Colorado Avalanche"),
    ("CBJ", "Columbus Blue Jackets"),
    ("DAL", "Dallas Stars"),
    ("DET", "Detroit Red Wings"),
    ("EDM", "Edmonton Oilers"),
    ("FLA", "Florida Panthers"),
    ("LAK", "Los Angeles Kings"),
    ("LA Kings", "Los Angeles Kings"),
    ("MIN", "Minnesota Wild"),
    ("MTL", "Montreal Canadiens"),
    ("Montréal Canadiens", "Montreal Canadiens"),
    ("NSH", "Nashville Predators"),
    ("NJD", "New Jersey Devils"),
    ("NJ Devils", "New Jersey Devils"),
    ("NYI", "New York Islanders"),
    ("NY Islanders", "New York Islanders"),
    ("NYR", "New York Rangers"),
    ("NY Rangers", "New York Rangers"),
    ("OTT", "Ottawa Senators"),
    ("PHI", "Philadelphia Flyers"),
    ("PIT", "Pittsburgh Penguins"),
    ("SJS", "San Jose Sharks"),
    ("SEA", "Seattle Kraken"),
    ("STL", "St. Louis Blues"),
    ("St Louis Blues", "St. Louis Blues"),
    ("TBL", "Tampa Bay Lightning"),
    ("TB Lightning", "Tampa Bay Lightning"),
    ("TOR", "Toronto Maple Leafs"),
    ("UTA", "Utah Hockey Club"),
    ("Utah HC", "Utah Hockey Club"),
    ("Utah Mammoth", "Utah Hockey Club"),
    ("VAN", "Vancouver Canucks"),
    ("VGK", "Vegas Golden Knights"),
    ("WSH", "Washington Capitals"),
    ("WPG", "Winnipeg Jets"),
];

const NBA_ALIASES: AliasTable = &[
    ("ATL", "Atlanta Hawks"),
    ("BKN", "Brooklyn Nets"),
    ("BOS", "Boston Celtics"),
    ("CHA", "Charlotte Hornets"),
    ("CHI", "Chicago Bulls"),
    ("CLE", "Cleveland Cavaliers"),
    ("DAL", "Dallas Mavericks"),
    ("DEN", "Denver Nuggets"),
    ("DET", "Detroit Pistons"),
    ("GSW", "Golden State Warriors"),
    ("GS Warriors", "Golden State Warriors"),
    ("HOU", "Houston Rockets"),
    ("IND", "Indiana Pacers"),
    ("LAC", "Los Angeles Clippers"),
    ("LA Clippers", "Los Angeles Clippers"),
    ("LAL", "Los Angeles Lakers"),
    ("LA Lakers", "Los Angeles Lakers"),
    ("MEM", "Memphis Grizzlies"),
    ("MIA", "Miami Heat"),
    ("MIL", "Milwaukee Bucks"),
    ("MIN", "Minnesota Timberwolves"),
    ("NOP", "New Orleans Pelicans"),
    ("NYK", "New York Knicks"),
    ("NY Knicks", "New York Knicks"),
    ("OKC", "Oklahoma City Thunder"),
    ("ORL", "Orlando Magic"),
    ("PHI", "Philadelphia 76ers"),
    ("Philadelphia Sixers", "Philadelphia 76ers"),
    ("PHX", "Phoenix Suns"),
    ("POR", "Portland Trail Blazers"),
    ("Portland Trailblazers", "Portland Trail Blazers"),
    ("SAC", "Sacramento Kings"),
    ("SAS", "San Antonio Spurs"),
    ("TOR", "Toronto Raptors"),
    ("UTA", "Utah Jazz"),
    ("WAS", "Washington Wizards"),
];

const NFL_ALIASES: AliasTable = &[
    ("ARI", "Arizona Cardinals"),
    ("ATL", "Atlanta Falcons"),
    ("BAL", "Baltimore Ravens"),
    ("BUF", "Buffalo Bills"),
    ("CAR", "Carolina Panthers"),
    ("CHI", "Chicago Bears"),
    ("CIN", "Cincinnati Bengals"),
    ("CLE", "Cleveland Browns"),
    ("DAL", "Dallas Cowboys"),
    ("DEN", "Denver Broncos"),
    ("DET", "Detroit Lions"),
    ("GB", "Green Bay Packers"),
    ("GB Packers", "Green Bay Packers"),
    ("HOU", "Houston Texans"),
    ("IND", "Indianapolis Colts"),
    ("JAX", "Jacksonville Jaguars"),
    ("KC", "Kansas City Chiefs"),
    ("KC Chiefs", "Kansas City Chiefs"),
    ("LV", "Las Vegas Raiders"),
    ("LV Raiders", "Las Vegas Raiders"),
    ("LAC", "Los Angeles Chargers"),
    ("LA Chargers", "Los Angeles Chargers"),
    ("LAR", "Los Angeles Rams"),
    ("LA Rams", "Los Angeles Rams"),
    ("MIA", "Miami Dolphins"),
    ("MIN", "Minnesota Vikings"),
    ("NE", "New England Patriots"),
    ("NE Patriots", "New England Patriots"),
    ("NO", "New Orleans Saints"),
    ("NO Saints", "New Orleans Saints"),
    ("NYG", "New York Giants"),
    ("NY Giants", "New York Giants"),
    ("NYJ", "New York Jets"),
    ("NY Jets", "New York Jets"),
    ("PHI", "Philadelphia Eagles"),
    ("PIT", "Pittsburgh Steelers"),
    ("SF", "San Francisco 49ers"),
    ("SF 49ers", "San Francisco 49ers"),
    ("SEA", "Seattle Seahawks"),
    ("TB", "Tampa Bay Buccaneers"),
    ("TB Buccaneers", "Tampa Bay Buccaneers"),
    ("TEN", "Tennessee Titans"),
    ("WAS", "Washington Commanders"),
    ("Washington Football Team", "Washington Commanders"),
];

const MLB_ALIASES: AliasTable = &[
    ("Athletics", "Oakland Athletics"),
    ("Sacramento Athletics", "Oakland Athletics"),
    ("Arizona D-backs", "Arizona Diamondbacks"),
    ("Cleveland Indians", "Cleveland Guardians"),
    ("LA Angels", "Los Angeles Angels"),
    ("LA Dodgers", "Los Angeles Dodgers"),
    ("NY Mets", "New York Mets"),
    ("NY Yankees", "New York Yankees"),
    ("SD Padres", "San Diego Padres"),
    ("SF Giants", "San Francisco Giants"),
    ("St Louis Cardinals", "St. Louis Cardinals"),
    ("TB Rays", "Tampa Bay Rays"),
    ("Chi Cubs", "Chicago Cubs"),
    ("Chi White Sox", "Chicago White Sox"),
];

const NCAAF_ALIASES: AliasTable = &[
    ("Ohio St", "Ohio State"),
    ("Ohio State Buckeyes", "Ohio State"),
    ("Michigan Wolverines", "Michigan"),
    ("Alabama Crimson Tide", "Alabama"),
    ("Georgia Bulldogs", "Georgia"),
    ("Texas Longhorns", "Texas"),
    ("Texas A&M Aggies", "Texas A&M"),
    ("TAMU", "Texas A&M"),
    ("LSU Tigers", "LSU"),
    ("Louisiana State", "LSU"),
    ("Miami (FL)", "Miami"),
    ("Miami Hurricanes", "Miami"),
    ("Miami (OH)", "Miami (OH)"),
    ("Miami RedHawks", "Miami (OH)"),
    ("Ole Miss Rebels", "Ole Miss"),
    ("Mississippi", "Ole Miss"),
    ("USC Trojans", "USC"),
    ("Southern California", "USC"),
    ("Penn St", "Penn State"),
    ("Penn State Nittany Lions", "Penn State"),
    ("Notre Dame Fighting Irish", "Notre Dame"),
    ("Florida St", "Florida State"),
    ("Florida State Seminoles", "Florida State"),
    ("Oklahoma St", "Oklahoma State"),
    ("Oregon Ducks", "Oregon"),
    ("Clemson Tigers", "Clemson"),
    ("UConn", "Connecticut"),
    ("BYU Cougars", "BYU"),
    ("Brigham Young", "BYU"),
    ("UCF Knights", "UCF"),
    ("Central Florida", "UCF"),
];

const NCAAB_ALIASES: AliasTable = &[
    ("Duke Blue Devils", "Duke"),
    ("North Carolina Tar Heels", "North Carolina"),
    ("UNC", "North Carolina"),
    ("Kentucky Wildcats", "Kentucky"),
    ("Kansas Jayhawks", "Kansas"),
    ("Gonzaga Bulldogs", "Gonzaga"),
    ("UConn", "Connecticut"),
    ("UConn Huskies", "Connecticut"),
    ("Michigan St", "Michigan State"),
    ("Michigan State Spartans", "Michigan State"),
    ("Saint Mary's", "Saint Mary's (CA)"),
    ("St. Mary's", "Saint Mary's (CA)"),
    ("St Johns", "St. John's"),
    ("St. John's Red Storm", "St. John's"),
    ("Miami (FL)", "Miami"),
    ("Ole Miss", "Mississippi"),
    ("UCLA Bruins", "UCLA"),
    ("Houston Cougars", "Houston"),
    ("Purdue Boilermakers", "Purdue"),
    ("Arizona Wildcats", "Arizona"),
];

fn aliases_for(sport: Sport) -> AliasTable {
    match sport {
        Sport::Nhl => NHL_ALIASES,
        Sport::Nba => NBA_ALIASES,
        Sport::Nfl => NFL_ALIASES,
        Sport::Mlb => MLB_ALIASES,
        Sport::Ncaaf => NCAAF_ALIASES,
        Sport::Ncaab => NCAAB_ALIASES,
        Sport::Nascar => &[],
    }
}

/// Lookup key for a team name. Case, punctuation, "&"/"and" and spacing
/// differences between providers all collapse to the same key.
pub fn team_key(name: &str) -> String {
    let replaced = name.to_lowercase().replace('&', " and ");
    replaced
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '(' || *c == ')')
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn lookup_tables() -> &'static HashMap<Sport, HashMap<String, &'static str>> {
    static TABLES: OnceLock<HashMap<Sport, HashMap<String, &'static str>>> = OnceLock::new();
    TABLES.get_or_init(|| {
        Sport::ALL
            .iter()
            .map(|&sport| {
                let mut table = HashMap::new();
                for &(alias, canonical) in aliases_for(sport) {
                    table.insert(team_key(canonical), canonical);
                    table.insert(team_key(alias), canonical);
                }
                (sport, table)
            })
            .collect()
    })
}

/// Canonical team name for a provider spelling. Unmapped names pass through
/// with whitespace tidied but otherwise unchanged.
pub fn canonical_team_name(sport: Sport, raw: &str) -> String {
    let key = team_key(raw);
    match lookup_tables().get(&sport).and_then(|table| table.get(&key)) {
        Some(canonical) => (*canonical).to_string(),
        None => raw.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_key() {
        assert_eq!(team_key("St. Louis  Blues"), "st louis blues");
        assert_eq!(team_key("Texas A&M"), "texas a and m");
        assert_eq!(team_key("Miami (FL)"), "miami (fl)");
    }

    #[test]
    fn test_known_variants_map_to_one_name() {
        for raw in ["LA Kings", "LAK", "los angeles kings", "Los Angeles Kings"] {
            assert_eq!(canonical_team_name(Sport::Nhl, raw), "Los Angeles Kings");
        }
        assert_eq!(
            canonical_team_name(Sport::Nhl, "St Louis Blues"),
            "St. Louis Blues"
        );
        assert_eq!(
            canonical_team_name(Sport::Nhl, "Montréal Canadiens"),
            "Montreal Canadiens"
        );
        assert_eq!(canonical_team_name(Sport::Ncaaf, "Ohio St."), "Ohio State");
    }

    #[test]
    fn test_tables_are_per_sport() {
        assert_eq!(canonical_team_name(Sport::Nhl, "BOS"), "Boston Bruins");
        assert_eq!(canonical_team_name(Sport::Nba, "BOS"), "Boston Celtics");
        assert_eq!(canonical_team_name(Sport::Ncaaf, "Miami (FL)"), "Miami");
        assert_eq!(canonical_team_name(Sport::Ncaab, "Ole Miss"), "Mississippi");
    }

    #[test]
    fn test_unmapped_names_pass_through() {
        assert_eq!(
            canonical_team_name(Sport::Nhl, "  Springfield   Isotopes "),
            "Springfield Isotopes"
        );
        assert_eq!(canonical_team_name(Sport::Nascar, "Kyle Larson"), "Kyle Larson");
    }
}
